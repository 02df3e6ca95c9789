//! Read-only projections of the document.

use rpg_core::{FileLayout, ImplPlan, NodeKind};
use serde::{Deserialize, Serialize};

/// One node as seen in the RPG view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub kind: NodeKind,
    pub summary: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub in_degree: usize,
    pub out_degree: usize,
    /// Kahn layer; absent when the graph is cyclic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub id: String,
    pub from: String,
    pub to: String,
    pub order_before: bool,
}

/// The graph at a glance: nodes in id order with degrees and layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpgView {
    pub goal: String,
    pub rev: u64,
    pub depth: usize,
    pub nodes: Vec<NodeSummary>,
    pub edges: Vec<EdgeSummary>,
}

/// What has been planned for implementation so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplView {
    pub rev: u64,
    /// Whether batches could be emitted from the current document.
    pub ready: bool,
    /// Why not, when `ready` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_layout: Option<FileLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_plan_preview: Option<ImplPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotExport {
    pub dot: String,
}
