//! Nodes and ports of the planning graph.
//!
//! A [`Node`] is one planned software component. Its interface is a pair of
//! ordered port lists; port identity is by name, and input and output names
//! are independent namespaces.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Node kind
// ---------------------------------------------------------------------------

/// The closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Framework,
    Module,
    Atom,
    Adapter,
    Infra,
    Test,
}

impl NodeKind {
    /// All kinds, in declaration order.
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Framework,
        NodeKind::Module,
        NodeKind::Atom,
        NodeKind::Adapter,
        NodeKind::Infra,
        NodeKind::Test,
    ];

    /// The lowercase wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Framework => "framework",
            NodeKind::Module => "module",
            NodeKind::Atom => "atom",
            NodeKind::Adapter => "adapter",
            NodeKind::Infra => "infra",
            NodeKind::Test => "test",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::InvalidArgument {
                reason: format!("unknown node kind '{s}'"),
            })
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Which side of a node a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    #[serde(alias = "in")]
    Input,
    #[serde(alias = "out")]
    Output,
}

impl PortDirection {
    pub fn opposite(self) -> PortDirection {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

fn default_required() -> bool {
    true
}

/// A named, directed interface point on a node.
///
/// `port_type` is an opaque structured descriptor. It is absent until set
/// explicitly, so a node may exist with untyped ports mid-design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub port_type: Option<serde_json::Value>,
}

impl Port {
    /// A required, untyped port.
    pub fn new(name: impl Into<String>) -> Self {
        Port {
            name: name.into(),
            required: true,
            port_type: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn typed(mut self, port_type: serde_json::Value) -> Self {
        self.port_type = Some(port_type);
        self
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Documentation-level pre/post conditions. Never executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contracts {
    #[serde(default)]
    pub pre: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
}

impl Contracts {
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

/// A planned software component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_prompt: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub contracts: Contracts,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
}

impl Node {
    /// Creates a bare node with no ports.
    pub fn new(id: impl Into<String>, kind: NodeKind, summary: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            kind,
            summary: summary.into(),
            language: None,
            framework_hint: None,
            build_prompt: None,
            tags: BTreeSet::new(),
            contracts: Contracts::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// The port list for one direction.
    pub fn ports(&self, direction: PortDirection) -> &[Port] {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    pub fn ports_mut(&mut self, direction: PortDirection) -> &mut Vec<Port> {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&Port> {
        self.ports(direction).iter().find(|p| p.name == name)
    }

    pub fn port_mut(&mut self, direction: PortDirection, name: &str) -> Option<&mut Port> {
        self.ports_mut(direction).iter_mut().find(|p| p.name == name)
    }

    pub fn has_port(&self, direction: PortDirection, name: &str) -> bool {
        self.port(direction, name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Adapter".parse::<NodeKind>().unwrap(), NodeKind::Adapter);
        assert!("service".parse::<NodeKind>().is_err());
    }

    #[test]
    fn port_defaults_to_required_and_untyped() {
        let port: Port = serde_json::from_str(r#"{"name":"req"}"#).unwrap();
        assert!(port.required);
        assert!(port.port_type.is_none());
    }

    #[test]
    fn port_type_serializes_under_type_key() {
        let port = Port::new("req").typed(serde_json::json!({"kind": "http"}));
        let json = serde_json::to_value(&port).unwrap();
        assert_eq!(json["type"]["kind"], "http");
    }

    #[test]
    fn direction_accepts_short_aliases() {
        let d: PortDirection = serde_json::from_str(r#""out""#).unwrap();
        assert_eq!(d, PortDirection::Output);
        assert_eq!(d.opposite(), PortDirection::Input);
    }

    #[test]
    fn input_and_output_namespaces_are_independent() {
        let mut node = Node::new("codec", NodeKind::Atom, "codec");
        node.inputs.push(Port::new("data"));
        node.outputs.push(Port::new("data"));
        assert!(node.has_port(PortDirection::Input, "data"));
        assert!(node.has_port(PortDirection::Output, "data"));
        assert!(!node.has_port(PortDirection::Input, "other"));
    }
}
