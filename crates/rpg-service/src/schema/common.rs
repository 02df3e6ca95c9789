//! Shared request/response pieces.

use rpg_check::Diagnostic;
use serde::{Deserialize, Serialize};

/// Options every mutating request accepts, flattened into its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOptions {
    /// Idempotency key. A repeated key returns the first response unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Revision the caller's edit is based on; `STALE_REV` if it moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_rev: Option<u64>,
}

impl MutationOptions {
    pub fn with_request_id(mut self, key: impl Into<String>) -> Self {
        self.request_id = Some(key.into());
        self
    }

    pub fn with_expected_rev(mut self, rev: u64) -> Self {
        self.expected_rev = Some(rev);
        self
    }
}

/// Result of a committed mutation: the new revision, the operation's own
/// result, and the validator warnings of the committed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Committed<T> {
    pub rev: u64,
    pub result: T,
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
}
