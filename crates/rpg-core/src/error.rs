//! Core error types for rpg-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! every way a structural edit of the planning graph can be refused.

use thiserror::Error;

use crate::node::PortDirection;

/// Errors produced by the mutation algebra and the document helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was not found in the document.
    #[error("node not found: '{id}'")]
    NodeNotFound { id: String },

    /// A port was not found on a node in the given direction.
    #[error("{direction} port '{port}' not found on node '{node}'")]
    PortNotFound {
        node: String,
        port: String,
        direction: PortDirection,
    },

    /// No edge matched the given id or endpoints.
    #[error("edge not found: {reference}")]
    EdgeNotFound { reference: String },

    /// A port name is already taken in that direction on the node.
    #[error("duplicate {direction} port '{port}' on node '{node}'")]
    DuplicatePort {
        node: String,
        port: String,
        direction: PortDirection,
    },

    /// An edge id is already taken, or an identical connection exists.
    #[error("duplicate edge: {reason}")]
    DuplicateEdge { reason: String },

    /// An endpoint names a port that only exists in the opposite direction.
    #[error("direction mismatch: {reason}")]
    DirectionMismatch { reason: String },

    /// A port or node is still referenced by edges.
    #[error("'{target}' still has {count} incident edge(s)")]
    PortHasEdges { target: String, count: usize },

    /// The edit would make the dependency graph cyclic.
    #[error("cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The split request does not partition the original ports.
    #[error("invalid split of '{node}': {reason}")]
    InvalidSplit { node: String, reason: String },

    /// The merge request cannot be honoured.
    #[error("invalid merge: {reason}")]
    InvalidMerge { reason: String },

    /// Nodes of different kinds cannot be merged.
    #[error("cannot merge nodes of different kinds: {kinds}")]
    KindMismatch { kinds: String },

    /// A JSON-patch operation failed or produced an undecodable document.
    #[error("invalid patch operation #{index}: {reason}")]
    InvalidPatch { index: usize, reason: String },

    /// The document could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed arguments that are not covered by a more specific variant.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}
