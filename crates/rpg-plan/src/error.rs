use rpg_check::Diagnostic;
use thiserror::Error;

/// Errors from layout planning and batch emission.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The layout policy names no known language convention.
    #[error("unknown layout policy '{policy}' (expected auto or one of: {known})")]
    UnknownPolicy { policy: String, known: String },

    /// Batches were requested before the graph was laid out and valid.
    #[error("not ready: {reason}")]
    NotReady {
        reason: String,
        errors: Vec<Diagnostic>,
    },

    /// Layering stalled; the validator should have caught this earlier.
    #[error("cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}
