//! Persistence for the planning document.
//!
//! The document is the unit of persistence and of optimistic concurrency:
//! every commit names the revision it was derived from and is refused if
//! another writer got there first.
//!
//! # Modules
//!
//! - [`traits`]: the [`DocumentStore`] trait all backends implement.
//! - [`file`]: [`FileStore`], one JSON file guarded by a lock file and
//!   replaced atomically.
//! - [`memory`]: [`InMemoryStore`], for tests and embedding.
//! - [`hash`]: [`content_hash`], the blake3 fingerprint of canonical content.
//! - [`error`]: [`StorageError`].

pub mod error;
pub mod file;
pub mod hash;
pub mod memory;
pub mod traits;

pub use error::StorageError;
pub use file::{FileStore, StoreConfig, DEFAULT_STALE_LOCK_AFTER, STALE_LOCK_ENV};
pub use hash::{content_hash, FINGERPRINT_LEN};
pub use memory::InMemoryStore;
pub use traits::DocumentStore;
