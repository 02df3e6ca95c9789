//! Session and document-level requests.

use std::collections::BTreeSet;

use rpg_core::{Constraints, IoBoundaries, RpgDocument};
use serde::{Deserialize, Serialize};

use super::common::MutationOptions;

/// Creates the document, or returns the existing one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub io_boundaries: IoBoundaries,
    #[serde(default)]
    pub constraints: Constraints,
    /// Replace an existing document instead of returning it.
    #[serde(default)]
    pub reset: bool,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub rev: u64,
    /// `false` when an existing document was returned untouched.
    pub created: bool,
    pub document: RpgDocument,
}

/// Replaces the constraints and, optionally, the document-level goal,
/// capabilities and io-boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetConstraintsRequest {
    #[serde(default)]
    pub constraints: Option<Constraints>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub capabilities: Option<BTreeSet<String>>,
    #[serde(default)]
    pub io_boundaries: Option<IoBoundaries>,
    #[serde(flatten)]
    pub options: MutationOptions,
}

/// Document export, as stored or in canonical form with its hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSnapshotRequest {
    #[serde(default)]
    pub canonical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub rev: u64,
    pub hash: String,
    pub canonical: bool,
    pub document: serde_json::Value,
}
