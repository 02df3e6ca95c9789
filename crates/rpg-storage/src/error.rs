//! Storage error types for rpg-storage.
//!
//! [`StorageError`] covers every way loading or committing the document can
//! fail: I/O, (de)serialization, missing documents, and the two concurrency
//! refusals, a stale revision and a contended lock.

use rpg_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the document or its lock failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonicalization for hashing failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No document has been persisted yet.
    #[error("no document at {path}")]
    NotFound { path: String },

    /// The persisted revision is not the one the caller based its edit on.
    /// Revision 0 stands for "no document".
    #[error("stale revision: expected {expected}, found {actual}")]
    StaleRev { expected: u64, actual: u64 },

    /// Another writer holds the lock file.
    #[error("document is locked by another writer ({path})")]
    Locked { path: String },
}
