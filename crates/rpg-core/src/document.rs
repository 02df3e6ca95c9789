//! The planning-graph document: the single unit of persistence and of
//! optimistic-concurrency control.
//!
//! Nodes and edges live in flat, id-indexed collections. Edges refer to
//! nodes and ports by id and name only, so structural edits rewrite ids in
//! the edge list instead of chasing references.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::derived::{FileLayout, ImplPlan};
use crate::edge::{Edge, Endpoint};
use crate::error::CoreError;
use crate::node::{Node, PortDirection};

/// One declared external input or output the plan must account for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoBoundary {
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// External inputs and outputs, each in declared order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoBoundaries {
    #[serde(default)]
    pub inputs: Vec<IoBoundary>,
    #[serde(default)]
    pub outputs: Vec<IoBoundary>,
}

/// Runtime and license allow/deny lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub runtime: Vec<String>,
    #[serde(default)]
    pub licenses_allow: Vec<String>,
    #[serde(default)]
    pub licenses_deny: Vec<String>,
}

fn initial_rev() -> u64 {
    1
}

/// The whole planning graph plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpgDocument {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub io_boundaries: IoBoundaries,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub nodes: IndexMap<String, Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default = "initial_rev")]
    pub rev: u64,
    #[serde(rename = "fileLayout", default, skip_serializing_if = "Option::is_none")]
    pub file_layout: Option<FileLayout>,
    #[serde(rename = "implPlanPreview", default, skip_serializing_if = "Option::is_none")]
    pub impl_plan_preview: Option<ImplPlan>,
}

impl RpgDocument {
    /// Creates an empty document at revision 1.
    pub fn new(goal: impl Into<String>) -> Self {
        RpgDocument {
            goal: goal.into(),
            capabilities: BTreeSet::new(),
            io_boundaries: IoBoundaries::default(),
            constraints: Constraints::default(),
            nodes: IndexMap::new(),
            edges: Vec::new(),
            rev: initial_rev(),
            file_layout: None,
            impl_plan_preview: None,
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn node(&self, id: &str) -> Result<&Node, CoreError> {
        self.nodes
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.to_string() })
    }

    pub fn node_mut(&mut self, id: &str) -> Result<&mut Node, CoreError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.to_string() })
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Edges with either end on `node`, in list order.
    pub fn incident_edges<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches_node(node))
    }

    /// Edges attached to one specific port.
    pub fn port_edges<'a>(
        &'a self,
        node: &'a str,
        direction: PortDirection,
        port: &'a str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| {
            let end = match direction {
                PortDirection::Output => &e.from,
                PortDirection::Input => &e.to,
            };
            end.node == node && end.port == port
        })
    }

    /// Resolves an endpoint against a node's ports in the expected direction.
    ///
    /// Reports `NodeNotFound`/`PortNotFound` when nothing matches, and
    /// `DirectionMismatch` when the port exists only on the opposite side.
    pub fn resolve_endpoint(
        &self,
        endpoint: &Endpoint,
        direction: PortDirection,
    ) -> Result<(), CoreError> {
        let node = self.node(&endpoint.node)?;
        if node.has_port(direction, &endpoint.port) {
            return Ok(());
        }
        if node.has_port(direction.opposite(), &endpoint.port) {
            return Err(CoreError::DirectionMismatch {
                reason: format!(
                    "'{}' is an {} port, expected an {} port",
                    endpoint,
                    direction.opposite(),
                    direction
                ),
            });
        }
        Err(CoreError::PortNotFound {
            node: endpoint.node.clone(),
            port: endpoint.port.clone(),
            direction,
        })
    }

    /// Drops the cached file layout and implementation plan; both describe a
    /// graph that no longer exists once the structure changes.
    pub fn clear_derived(&mut self) {
        self.file_layout = None;
        self.impl_plan_preview = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, Port};

    fn sample() -> RpgDocument {
        let mut doc = RpgDocument::new("demo");
        let mut a = Node::new("a", NodeKind::Module, "a");
        a.outputs.push(Port::new("out"));
        let mut b = Node::new("b", NodeKind::Module, "b");
        b.inputs.push(Port::new("in"));
        doc.nodes.insert("a".into(), a);
        doc.nodes.insert("b".into(), b);
        doc
    }

    #[test]
    fn new_document_starts_at_rev_one() {
        assert_eq!(RpgDocument::new("g").rev, 1);
    }

    #[test]
    fn derived_fields_use_camel_case_keys() {
        let json = serde_json::to_value(RpgDocument::new("g")).unwrap();
        assert!(json.get("fileLayout").is_none());
        let mut doc: RpgDocument = serde_json::from_value(serde_json::json!({
            "goal": "g",
            "rev": 4,
            "implPlanPreview": {"batches": []}
        }))
        .unwrap();
        assert_eq!(doc.rev, 4);
        assert!(doc.impl_plan_preview.is_some());
        doc.clear_derived();
        assert!(doc.impl_plan_preview.is_none());
    }

    #[test]
    fn resolve_endpoint_distinguishes_direction_mismatch() {
        let doc = sample();
        assert!(doc
            .resolve_endpoint(&Endpoint::new("a", "out"), PortDirection::Output)
            .is_ok());
        assert!(matches!(
            doc.resolve_endpoint(&Endpoint::new("b", "in"), PortDirection::Output),
            Err(CoreError::DirectionMismatch { .. })
        ));
        assert!(matches!(
            doc.resolve_endpoint(&Endpoint::new("b", "nope"), PortDirection::Input),
            Err(CoreError::PortNotFound { .. })
        ));
        assert!(matches!(
            doc.resolve_endpoint(&Endpoint::new("zz", "in"), PortDirection::Input),
            Err(CoreError::NodeNotFound { .. })
        ));
    }
}
