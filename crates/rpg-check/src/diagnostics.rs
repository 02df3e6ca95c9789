//! Validator findings with enough context to locate and fix them.
//!
//! A [`Diagnostic`] is data, not an error: hard findings block a commit,
//! warnings travel alongside a successful result.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable finding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Structural (hard).
    DuplicateId,
    DuplicatePort,
    NotFound,
    DirectionMismatch,
    DuplicateEdge,
    SelfLoop,
    CycleDetected,

    // Design quality (soft).
    CapabilityUncovered,
    IoBoundaryUncovered,
    RequiredInputUnbound,
    IsolatedNode,

    // Compatibility heuristics (soft).
    RuntimeNotAllowed,
    LicenseDenied,
    LicenseNotAllowed,
    LanguageBoundary,
    TestEcosystemMismatch,
    PortTypeMismatch,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::DuplicateId => "DUPLICATE_ID",
            DiagnosticCode::DuplicatePort => "DUPLICATE_PORT",
            DiagnosticCode::NotFound => "NOT_FOUND",
            DiagnosticCode::DirectionMismatch => "DIRECTION_MISMATCH",
            DiagnosticCode::DuplicateEdge => "DUPLICATE_EDGE",
            DiagnosticCode::SelfLoop => "SELF_LOOP",
            DiagnosticCode::CycleDetected => "CYCLE_DETECTED",
            DiagnosticCode::CapabilityUncovered => "CAPABILITY_UNCOVERED",
            DiagnosticCode::IoBoundaryUncovered => "IO_BOUNDARY_UNCOVERED",
            DiagnosticCode::RequiredInputUnbound => "REQUIRED_INPUT_UNBOUND",
            DiagnosticCode::IsolatedNode => "ISOLATED_NODE",
            DiagnosticCode::RuntimeNotAllowed => "RUNTIME_NOT_ALLOWED",
            DiagnosticCode::LicenseDenied => "LICENSE_DENIED",
            DiagnosticCode::LicenseNotAllowed => "LICENSE_NOT_ALLOWED",
            DiagnosticCode::LanguageBoundary => "LANGUAGE_BOUNDARY",
            DiagnosticCode::TestEcosystemMismatch => "TEST_ECOSYSTEM_MISMATCH",
            DiagnosticCode::PortTypeMismatch => "PORT_TYPE_MISMATCH",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validator finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Node the finding is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Edge the finding is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    /// Offending node path, for cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            node: None,
            edge: None,
            path: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(code, message)
        }
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn on_edge(mut self, edge: impl Into<String>) -> Self {
        self.edge = Some(edge.into());
        self
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Outcome of `validate_graph`: hard errors and advisory warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationReport {
    /// `true` when nothing blocks a commit.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Files a diagnostic under its severity.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors.push(diagnostic);
        } else {
            self.warnings.push(diagnostic);
        }
    }

    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|d| d.code == code)
    }
}
