//! Structural-edit requests and their results.
//!
//! Requests reuse the core argument types (`NewNode`, `NodeUpdate`,
//! `MergeRequest`, `AdapterRequest`, `PatchOp`) and add the common
//! [`MutationOptions`] via `#[serde(flatten)]`.

use rpg_core::{
    AdapterRequest, Contracts, Endpoint, MergeRequest, NewNode, NodeUpdate, PatchOp, Port,
    PortDirection, SplitPart,
};
use serde::{Deserialize, Serialize};

use super::common::MutationOptions;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeRequest {
    #[serde(flatten)]
    pub node: NewNode,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNodeRequest {
    pub id: String,
    #[serde(flatten)]
    pub update: NodeUpdate,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNodeRequest {
    pub id: String,
    /// Remove incident edges instead of refusing with `PORT_HAS_EDGES`.
    #[serde(default)]
    pub force: bool,
    #[serde(flatten)]
    pub options: MutationOptions,
}

/// The id of a node an operation created or touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedNode {
    pub id: String,
    pub removed_edges: Vec<String>,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPortRequest {
    pub node: String,
    pub direction: PortDirection,
    #[serde(flatten)]
    pub port: Port,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePortRequest {
    pub node: String,
    pub direction: PortDirection,
    pub name: String,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPortTypeRequest {
    pub node: String,
    pub direction: PortDirection,
    pub name: String,
    /// `null` or absent clears the type.
    #[serde(default, rename = "type")]
    pub port_type: Option<serde_json::Value>,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePortRequest {
    pub node: String,
    pub direction: PortDirection,
    pub old: String,
    pub new: String,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedPort {
    pub node: String,
    pub name: String,
    pub rewritten_edges: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContractsRequest {
    pub node: String,
    pub contracts: Contracts,
    #[serde(flatten)]
    pub options: MutationOptions,
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddEdgeRequest {
    pub from: Endpoint,
    pub to: Endpoint,
    #[serde(default)]
    pub order_before: bool,
    /// Caller-chosen edge id; doubles as the idempotency key when no
    /// `requestId` is given.
    #[serde(default, rename = "edgeId")]
    pub edge_id: Option<String>,
    #[serde(flatten)]
    pub options: MutationOptions,
}

/// Removes an edge by id, or by its endpoint pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveEdgeRequest {
    #[serde(default, rename = "edgeId")]
    pub edge_id: Option<String>,
    #[serde(default)]
    pub from: Option<Endpoint>,
    #[serde(default)]
    pub to: Option<Endpoint>,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Restructuring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitNodeRequest {
    pub node: String,
    pub parts: Vec<SplitPart>,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeNodesRequest {
    #[serde(flatten)]
    pub merge: MergeRequest,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertAdapterRequest {
    #[serde(flatten)]
    pub adapter: AdapterRequest,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    pub ops: Vec<PatchOp>,
    #[serde(flatten)]
    pub options: MutationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchResult {
    pub applied: usize,
}
