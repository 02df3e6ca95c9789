//! The operation surface of the planning engine.
//!
//! [`RpgService`] ties the crates together: it loads the document from a
//! [`rpg_storage::DocumentStore`], applies rpg-core edits, validates with
//! rpg-check, schedules with rpg-plan, and commits under optimistic
//! concurrency. Every failure is an [`ApiError`] with a stable code.
//!
//! # Modules
//!
//! - [`service`]: [`RpgService`] and its typed operations.
//! - [`dispatch`]: `call(op, args)` for transports that speak JSON.
//! - [`schema`]: request and response types.
//! - [`idempotency`]: the process-local retry cache.
//! - [`views`]: RPG/implementation views and DOT export.
//! - [`error`]: [`ApiError`] and [`ApiErrorDetail`].

pub mod dispatch;
pub mod error;
pub mod idempotency;
pub mod schema;
pub mod service;
pub mod views;

pub use dispatch::OPERATIONS;
pub use error::{ApiError, ApiErrorDetail};
pub use schema::{Committed, MutationOptions};
pub use service::RpgService;
