//! Scheduling views over a planning graph: where each node's files go and in
//! which parallel batches the nodes can be built.

pub mod batches;
pub mod error;
pub mod layout;

#[allow(deprecated)]
pub use batches::{build_impl_plan, emit_impl_batches};
pub use error::PlanError;
#[allow(deprecated)]
pub use layout::{plan_file_layout, synthesize_file_layout, LayoutRequest};
