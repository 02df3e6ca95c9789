//! The [`DocumentStore`] trait: the persistence contract for the planning
//! document.
//!
//! A store holds exactly one document. Reads are plain; writes are
//! compare-and-swap on the revision counter, so every backend gives the same
//! optimistic-concurrency semantics.

use rpg_core::RpgDocument;

use crate::error::StorageError;

/// Persistence for a single planning document.
///
/// Methods take `&self`; backends synchronise internally so a store can be
/// shared across threads.
pub trait DocumentStore {
    /// Loads the persisted document, or `None` if none exists yet.
    fn load(&self) -> Result<Option<RpgDocument>, StorageError>;

    /// Loads the persisted document, failing with `NotFound` if absent.
    fn load_required(&self) -> Result<RpgDocument, StorageError> {
        self.load()?.ok_or_else(|| StorageError::NotFound {
            path: self.location(),
        })
    }

    /// The persisted revision, `0` when no document exists.
    fn current_rev(&self) -> Result<u64, StorageError> {
        Ok(self.load()?.map_or(0, |doc| doc.rev))
    }

    /// Replaces the document if the persisted revision still equals
    /// `expected_rev` (`0` meaning "no document yet").
    ///
    /// The written document carries `rev = expected_rev + 1`, which is
    /// returned. On `StaleRev` nothing is written.
    fn commit(&self, doc: &RpgDocument, expected_rev: u64) -> Result<u64, StorageError>;

    /// Human-readable location, for messages.
    fn location(&self) -> String;
}
