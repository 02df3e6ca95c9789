//! Request and response types for the operation surface.
//!
//! Each sub-module covers one area. Requests deserialize from the JSON
//! arguments a transport passes to `call`; responses serialize back.

pub mod common;
pub mod mutations;
pub mod planning;
pub mod session;
pub mod views;

pub use common::{Committed, MutationOptions};
