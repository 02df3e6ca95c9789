pub mod canonical;
pub mod derived;
pub mod document;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod ops;
pub mod patch;

// Re-export commonly used types
pub use canonical::{canonical_json, canonical_value, canonicalize, content_value};
pub use derived::{BatchItem, FileAssignment, FileLayout, ImplBatch, ImplPlan, TestLayout};
pub use document::{Constraints, IoBoundaries, IoBoundary, RpgDocument};
pub use edge::{Edge, Endpoint};
pub use error::CoreError;
pub use graph::{DependencyGraph, Layering};
pub use node::{Contracts, Node, NodeKind, Port, PortDirection};
pub use ops::{
    AdapterOutcome, AdapterRequest, MergeOutcome, MergeRequest, NewNode, NodeUpdate, PortRef,
    SplitPart,
};
pub use patch::{apply_patch, PatchOp};
