//! Derived views cached on the document: the file layout and the
//! implementation-plan preview.
//!
//! These are produced by the scheduler and persisted so they need not be
//! recomputed, but they never feed back into the graph itself.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeKind;

/// Where test files go relative to their sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestLayout {
    /// Tests mirrored under a separate test tree.
    #[default]
    #[serde(rename = "dedicated")]
    Dedicated,
    /// Test files placed beside their source.
    #[serde(rename = "co-located", alias = "colocated")]
    CoLocated,
}

impl fmt::Display for TestLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestLayout::Dedicated => f.write_str("dedicated"),
            TestLayout::CoLocated => f.write_str("co-located"),
        }
    }
}

/// Files planned for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAssignment {
    pub language: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
}

/// The node-to-files mapping together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLayout {
    pub policy: String,
    pub test_layout: TestLayout,
    #[serde(default)]
    pub role_to_folder: BTreeMap<String, String>,
    pub files: BTreeMap<String, FileAssignment>,
}

/// One node scheduled inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub node: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_prompt: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A group of nodes whose implementation may proceed in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplBatch {
    pub index: usize,
    pub items: Vec<BatchItem>,
}

impl ImplBatch {
    /// Node ids in this batch, in id order.
    pub fn node_ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.node.as_str()).collect()
    }
}

/// Ordered batches covering every node exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplPlan {
    pub batches: Vec<ImplBatch>,
}

impl ImplPlan {
    /// Node ids grouped per batch, mostly for assertions and views.
    pub fn layers(&self) -> Vec<Vec<String>> {
        self.batches
            .iter()
            .map(|b| b.items.iter().map(|i| i.node.clone()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_wire_names() {
        assert_eq!(
            serde_json::to_string(&TestLayout::CoLocated).unwrap(),
            r#""co-located""#
        );
        let parsed: TestLayout = serde_json::from_str(r#""dedicated""#).unwrap();
        assert_eq!(parsed, TestLayout::Dedicated);
    }

    #[test]
    fn layout_uses_camel_case_keys() {
        let layout = FileLayout {
            policy: "auto".into(),
            test_layout: TestLayout::Dedicated,
            role_to_folder: BTreeMap::new(),
            files: BTreeMap::new(),
        };
        let json = serde_json::to_value(&layout).unwrap();
        assert!(json.get("testLayout").is_some());
        assert!(json.get("roleToFolder").is_some());
    }
}
