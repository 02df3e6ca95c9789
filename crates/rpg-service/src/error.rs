//! Caller-facing error type.
//!
//! [`ApiError`] is the single error every operation returns. Each variant
//! carries one machine-readable code; [`ApiError::detail`] renders the
//! structured `{code, message, details?}` value a transport sends back.
//! Lower-layer errors convert through `From`, so `?` maps them onto codes.

use rpg_check::{CheckError, Diagnostic};
use rpg_core::CoreError;
use rpg_plan::PlanError;
use rpg_storage::StorageError;
use serde::{Deserialize, Serialize};

/// Structured error detail returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "STALE_REV").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Diagnostic lists, cycle paths or revisions, when there are any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Every way an operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed call arguments.
    #[error("invalid arguments: {0}")]
    SchemaInvalid(String),

    /// A referenced node, port, edge or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An id or connection is already taken.
    #[error("duplicate: {0}")]
    DuplicateId(String),

    /// The target is still referenced by edges.
    #[error("{0}")]
    PortHasEdges(String),

    /// The edit would make the graph cyclic.
    #[error("cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The resulting document did not pass validation.
    #[error("validation failed with {} error(s)", .0.len())]
    ValidationFailed(Vec<Diagnostic>),

    /// Compatibility check failure.
    #[error("incompatible: {message}")]
    Incompatible {
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// Batch emission attempted before layout and validation.
    #[error("not ready: {message}")]
    NotReady {
        message: String,
        errors: Vec<Diagnostic>,
    },

    /// The document changed since the caller read it.
    #[error("stale revision: expected {expected}, current is {actual}")]
    StaleRev { expected: u64, actual: u64 },

    /// Another writer holds the document lock.
    #[error("locked: {0}")]
    Locked(String),

    /// I/O or serialization failure in the store.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::SchemaInvalid(_) => "SCHEMA_INVALID",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DuplicateId(_) => "DUPLICATE_ID",
            ApiError::PortHasEdges(_) => "PORT_HAS_EDGES",
            ApiError::CycleDetected { .. } => "CYCLE_DETECTED",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::Incompatible { .. } => "INCOMPATIBLE",
            ApiError::NotReady { .. } => "NOT_READY",
            ApiError::StaleRev { .. } => "STALE_REV",
            ApiError::Locked(_) => "LOCKED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn detail(&self) -> ApiErrorDetail {
        let details = match self {
            ApiError::CycleDetected { path } => Some(serde_json::json!({ "path": path })),
            ApiError::ValidationFailed(errors) => serde_json::to_value(errors).ok(),
            ApiError::Incompatible { diagnostics, .. } => serde_json::to_value(diagnostics).ok(),
            ApiError::NotReady { errors, .. } if !errors.is_empty() => {
                serde_json::to_value(errors).ok()
            }
            ApiError::StaleRev { expected, actual } => {
                Some(serde_json::json!({ "expected": expected, "actual": actual }))
            }
            _ => None,
        };
        ApiErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NodeNotFound { .. }
            | CoreError::PortNotFound { .. }
            | CoreError::EdgeNotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::DuplicatePort { .. } | CoreError::DuplicateEdge { .. } => {
                ApiError::DuplicateId(err.to_string())
            }
            CoreError::PortHasEdges { .. } => ApiError::PortHasEdges(err.to_string()),
            CoreError::CycleDetected { path } => ApiError::CycleDetected { path },
            CoreError::KindMismatch { .. } => ApiError::Incompatible {
                message: err.to_string(),
                diagnostics: Vec::new(),
            },
            CoreError::DirectionMismatch { .. }
            | CoreError::InvalidSplit { .. }
            | CoreError::InvalidMerge { .. }
            | CoreError::InvalidPatch { .. }
            | CoreError::InvalidArgument { .. } => ApiError::SchemaInvalid(err.to_string()),
            CoreError::Serialization(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<CheckError> for ApiError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Incompatible { ref diagnostics } => ApiError::Incompatible {
                message: err.to_string(),
                diagnostics: diagnostics.clone(),
            },
            CheckError::CycleDetected { path } => ApiError::CycleDetected { path },
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::UnknownPolicy { .. } => ApiError::SchemaInvalid(err.to_string()),
            PlanError::NotReady { reason, errors } => ApiError::NotReady {
                message: reason,
                errors,
            },
            PlanError::CycleDetected { path } => ApiError::CycleDetected { path },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => {
                ApiError::NotFound(format!("{err}; start a session first"))
            }
            StorageError::StaleRev { expected, actual } => ApiError::StaleRev { expected, actual },
            StorageError::Locked { .. } => ApiError::Locked(err.to_string()),
            StorageError::Core(inner) => inner.into(),
            StorageError::Io(_) | StorageError::Serialization(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InternalError(format!("serialization error: {err}"))
    }
}
