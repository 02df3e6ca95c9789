//! Validation, compatibility heuristics and scoring for planning graphs.
//!
//! All entry points are pure: they read a document and never modify it.

pub mod compat;
pub mod diagnostics;
pub mod error;
pub mod score;
pub mod validate;

pub use compat::validate_compatibility;
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity, ValidationReport};
pub use error::CheckError;
pub use score::{score_ir, ScoreReport};
pub use validate::validate_graph;
