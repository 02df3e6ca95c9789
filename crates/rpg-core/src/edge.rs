//! Edges between ports.
//!
//! An [`Edge`] always runs from an output port to an input port. Every edge
//! is a dependency of `to.node` on `from.node`; `order_before` additionally
//! asserts that the source must fully complete before the target begins.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One end of an edge: a node id and a port name on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(node: impl Into<String>, port: impl Into<String>) -> Self {
        Endpoint {
            node: node.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// A connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
    #[serde(default)]
    pub order_before: bool,
}

impl Edge {
    /// Returns `true` if either end sits on `node`.
    pub fn touches_node(&self, node: &str) -> bool {
        self.from.node == node || self.to.node == node
    }

    /// Returns `true` if this edge connects exactly these two endpoints.
    pub fn connects(&self, from: &Endpoint, to: &Endpoint) -> bool {
        self.from == *from && self.to == *to
    }

    /// Ordering used by the canonical form.
    pub fn canonical_cmp(&self, other: &Edge) -> Ordering {
        (&self.from.node, &self.from.port, &self.to.node, &self.to.port, &self.id).cmp(&(
            &other.from.node,
            &other.from.port,
            &other.to.node,
            &other.to.port,
            &other.id,
        ))
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str, from: (&str, &str), to: (&str, &str)) -> Edge {
        Edge {
            id: id.into(),
            from: Endpoint::new(from.0, from.1),
            to: Endpoint::new(to.0, to.1),
            order_before: false,
        }
    }

    #[test]
    fn order_before_defaults_to_false() {
        let e: Edge = serde_json::from_str(
            r#"{"id":"e","from":{"node":"a","port":"o"},"to":{"node":"b","port":"i"}}"#,
        )
        .unwrap();
        assert!(!e.order_before);
    }

    #[test]
    fn canonical_ordering_is_by_endpoints_first() {
        let a = edge("z", ("a", "out"), ("b", "in"));
        let b = edge("a", ("a", "out"), ("c", "in"));
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);
    }

    #[test]
    fn touches_either_end() {
        let e = edge("e", ("a", "out"), ("b", "in"));
        assert!(e.touches_node("a"));
        assert!(e.touches_node("b"));
        assert!(!e.touches_node("c"));
    }
}
