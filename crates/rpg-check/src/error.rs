use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Refusals from the advisory checks.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Strict compatibility checking found at least one warning.
    #[error("{} compatibility issue(s) found in strict mode", diagnostics.len())]
    Incompatible { diagnostics: Vec<Diagnostic> },

    /// A metric that needs a layering was asked of a cyclic graph.
    #[error("cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}
