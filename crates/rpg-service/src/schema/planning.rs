//! Layout, batch, compatibility and scoring requests.

use rpg_check::Diagnostic;
use rpg_plan::LayoutRequest;
use serde::{Deserialize, Serialize};

use super::common::MutationOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanLayoutRequest {
    #[serde(flatten)]
    pub layout: LayoutRequest,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmitBatchesRequest {
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatibilityRequest {
    /// Turn any finding into `INCOMPATIBLE`.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResponse {
    pub compatible: bool,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResponse {
    pub hash: String,
    pub document: serde_json::Value,
}
