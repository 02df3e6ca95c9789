//! In-memory [`DocumentStore`] for tests and embedding.
//!
//! Same revision semantics as the file store, without a lock file: the
//! mutex is the lock.

use std::sync::{Mutex, MutexGuard};

use rpg_core::RpgDocument;

use crate::error::StorageError;
use crate::traits::DocumentStore;

/// A store that keeps the document in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    doc: Mutex<Option<RpgDocument>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `doc` as-is.
    pub fn with_document(doc: RpgDocument) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<RpgDocument>> {
        // A panicking writer cannot leave a half-written document here.
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for InMemoryStore {
    fn load(&self) -> Result<Option<RpgDocument>, StorageError> {
        Ok(self.slot().clone())
    }

    fn commit(&self, doc: &RpgDocument, expected_rev: u64) -> Result<u64, StorageError> {
        let mut slot = self.slot();
        let actual = slot.as_ref().map_or(0, |d| d.rev);
        if actual != expected_rev {
            return Err(StorageError::StaleRev {
                expected: expected_rev,
                actual,
            });
        }
        let mut next = doc.clone();
        next.rev = expected_rev + 1;
        let rev = next.rev;
        *slot = Some(next);
        Ok(rev)
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
