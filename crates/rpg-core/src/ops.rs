//! The structural-editing algebra over [`RpgDocument`].
//!
//! Every operation either applies completely or returns an error and leaves
//! the document untouched. Multi-step edits (rename, split, merge, adapter
//! insertion) work on a scratch copy and swap it in only on success.
//!
//! These methods enforce the local preconditions of each edit. Whole-graph
//! validation before commit is the checker's job.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::document::RpgDocument;
use crate::edge::{Edge, Endpoint};
use crate::error::CoreError;
use crate::graph::{cycle_with_edge, DependencyGraph};
use crate::id::{derive_edge_id, unique_node_id};
use crate::node::{Contracts, Node, NodeKind, Port, PortDirection};

// ---------------------------------------------------------------------------
// Argument types
// ---------------------------------------------------------------------------

/// Everything needed to create a node. The id is generated from `hint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
    pub hint: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub framework_hint: Option<String>,
    #[serde(default)]
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

impl NewNode {
    pub fn new(hint: impl Into<String>, kind: NodeKind) -> Self {
        let hint = hint.into();
        NewNode {
            summary: hint.clone(),
            hint,
            kind,
            language: None,
            framework_hint: None,
            build_prompt: None,
            tags: BTreeSet::new(),
            contracts: Contracts::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// Field changes for `update_node`. `None` leaves a field alone; an empty
/// string clears an optional text field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub framework_hint: Option<String>,
    #[serde(default)]
    pub build_prompt: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub contracts: Option<Contracts>,
}

/// One part of a `split_node` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPart {
    pub summary: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A port addressed by direction and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub direction: PortDirection,
    pub name: String,
}

/// A `merge_nodes` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Same-named ports to fold into one instead of rejecting the collision.
    #[serde(default)]
    pub fold: Vec<PortRef>,
}

/// What a merge produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub node: String,
    /// Edges between two merged nodes; they would have become self-loops.
    pub dropped_edges: Vec<String>,
    /// Edges that became identical to another edge after folding.
    pub deduplicated_edges: Vec<String>,
}

/// An `insert_adapter` request. The edge is addressed by id or endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterRequest {
    #[serde(default)]
    pub edge_id: Option<String>,
    #[serde(default)]
    pub from: Option<Endpoint>,
    #[serde(default)]
    pub to: Option<Endpoint>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub buffer: bool,
    #[serde(default)]
    pub input_port: Option<String>,
    #[serde(default)]
    pub output_port: Option<String>,
}

/// What an adapter insertion produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterOutcome {
    pub adapter: String,
    pub removed_edge: String,
    pub edges: Vec<String>,
}

/// Tag recorded on adapters that should buffer between producer and consumer.
pub const BUFFER_TAG: &str = "buffer";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn check_unique_ports(node: &str, direction: PortDirection, ports: &[Port]) -> Result<(), CoreError> {
    let mut seen = BTreeSet::new();
    for port in ports {
        if port.name.is_empty() {
            return Err(CoreError::InvalidArgument {
                reason: format!("empty {direction} port name on '{node}'"),
            });
        }
        if !seen.insert(port.name.as_str()) {
            return Err(CoreError::DuplicatePort {
                node: node.to_string(),
                port: port.name.clone(),
                direction,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl RpgDocument {
    /// Adds a node and returns its generated id.
    pub fn add_node(&mut self, spec: NewNode) -> Result<String, CoreError> {
        let id = unique_node_id(&spec.hint, |c| self.contains_node(c));
        check_unique_ports(&id, PortDirection::Input, &spec.inputs)?;
        check_unique_ports(&id, PortDirection::Output, &spec.outputs)?;

        let node = Node {
            id: id.clone(),
            kind: spec.kind,
            summary: spec.summary,
            language: non_empty(spec.language),
            framework_hint: non_empty(spec.framework_hint),
            build_prompt: non_empty(spec.build_prompt),
            tags: spec.tags,
            contracts: spec.contracts,
            inputs: spec.inputs,
            outputs: spec.outputs,
        };
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Changes any node field except its id and ports.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> Result<(), CoreError> {
        let node = self.node_mut(id)?;
        if let Some(kind) = update.kind {
            node.kind = kind;
        }
        if let Some(summary) = update.summary {
            node.summary = summary;
        }
        if let Some(language) = update.language {
            node.language = non_empty(Some(language));
        }
        if let Some(hint) = update.framework_hint {
            node.framework_hint = non_empty(Some(hint));
        }
        if let Some(prompt) = update.build_prompt {
            node.build_prompt = non_empty(Some(prompt));
        }
        if let Some(tags) = update.tags {
            node.tags = tags;
        }
        if let Some(contracts) = update.contracts {
            node.contracts = contracts;
        }
        Ok(())
    }

    /// Deletes a node. Without `force`, a node with incident edges is
    /// refused; with it, those edges are removed first and returned.
    pub fn delete_node(&mut self, id: &str, force: bool) -> Result<Vec<Edge>, CoreError> {
        self.node(id)?;
        let count = self.incident_edges(id).count();
        if count > 0 && !force {
            return Err(CoreError::PortHasEdges {
                target: id.to_string(),
                count,
            });
        }
        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            self.edges.drain(..).partition(|e| e.touches_node(id));
        self.edges = kept;
        self.nodes.shift_remove(id);
        Ok(removed)
    }

    /// Appends a port to a node.
    pub fn add_port(
        &mut self,
        node: &str,
        direction: PortDirection,
        port: Port,
    ) -> Result<(), CoreError> {
        if port.name.is_empty() {
            return Err(CoreError::InvalidArgument {
                reason: "port name must not be empty".to_string(),
            });
        }
        let target = self.node_mut(node)?;
        if target.has_port(direction, &port.name) {
            return Err(CoreError::DuplicatePort {
                node: node.to_string(),
                port: port.name,
                direction,
            });
        }
        target.ports_mut(direction).push(port);
        Ok(())
    }

    /// Removes a port that no edge references.
    pub fn remove_port(
        &mut self,
        node: &str,
        direction: PortDirection,
        name: &str,
    ) -> Result<Port, CoreError> {
        let position = self
            .node(node)?
            .ports(direction)
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| CoreError::PortNotFound {
                node: node.to_string(),
                port: name.to_string(),
                direction,
            })?;
        let count = self.port_edges(node, direction, name).count();
        if count > 0 {
            return Err(CoreError::PortHasEdges {
                target: format!("{node}.{name}"),
                count,
            });
        }
        Ok(self.node_mut(node)?.ports_mut(direction).remove(position))
    }

    /// Connects an output port to an input port and returns the edge id.
    pub fn add_edge(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        order_before: bool,
        id: Option<String>,
    ) -> Result<String, CoreError> {
        self.resolve_endpoint(&from, PortDirection::Output)?;
        self.resolve_endpoint(&to, PortDirection::Input)?;

        let id = non_empty(id).unwrap_or_else(|| derive_edge_id(&from, &to));
        if self.edge(&id).is_some() {
            return Err(CoreError::DuplicateEdge {
                reason: format!("edge id '{id}' already exists"),
            });
        }
        if let Some(existing) = self.edges.iter().find(|e| e.connects(&from, &to)) {
            return Err(CoreError::DuplicateEdge {
                reason: format!("{} -> {} already connected by '{}'", from, to, existing.id),
            });
        }
        if let Some(path) = cycle_with_edge(self, &from, &to) {
            return Err(CoreError::CycleDetected { path });
        }

        self.edges.push(Edge {
            id: id.clone(),
            from,
            to,
            order_before,
        });
        Ok(id)
    }

    /// Removes the edge connecting exactly these endpoints.
    pub fn remove_edge(&mut self, from: &Endpoint, to: &Endpoint) -> Result<Edge, CoreError> {
        let position = self
            .edges
            .iter()
            .position(|e| e.connects(from, to))
            .ok_or_else(|| CoreError::EdgeNotFound {
                reference: format!("{from} -> {to}"),
            })?;
        Ok(self.edges.remove(position))
    }

    pub fn remove_edge_by_id(&mut self, id: &str) -> Result<Edge, CoreError> {
        let position = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CoreError::EdgeNotFound {
                reference: format!("id '{id}'"),
            })?;
        Ok(self.edges.remove(position))
    }

    /// Sets or clears a port's opaque type descriptor.
    pub fn set_port_type(
        &mut self,
        node: &str,
        direction: PortDirection,
        name: &str,
        port_type: Option<serde_json::Value>,
    ) -> Result<(), CoreError> {
        let port = self
            .node_mut(node)?
            .port_mut(direction, name)
            .ok_or_else(|| CoreError::PortNotFound {
                node: node.to_string(),
                port: name.to_string(),
                direction,
            })?;
        port.port_type = port_type.filter(|t| !t.is_null());
        Ok(())
    }

    pub fn set_contracts(&mut self, node: &str, contracts: Contracts) -> Result<(), CoreError> {
        self.node_mut(node)?.contracts = contracts;
        Ok(())
    }

    /// Renames a port and rewrites every incident edge in the same step.
    /// Returns the number of rewritten edges.
    pub fn rename_port(
        &mut self,
        node: &str,
        direction: PortDirection,
        old: &str,
        new: &str,
    ) -> Result<usize, CoreError> {
        if new.is_empty() {
            return Err(CoreError::InvalidArgument {
                reason: "port name must not be empty".to_string(),
            });
        }
        let target = self.node(node)?;
        if !target.has_port(direction, old) {
            return Err(CoreError::PortNotFound {
                node: node.to_string(),
                port: old.to_string(),
                direction,
            });
        }
        if old == new {
            return Err(CoreError::InvalidArgument {
                reason: format!("port '{old}' is already named '{new}'"),
            });
        }
        if target.has_port(direction, new) {
            return Err(CoreError::DuplicatePort {
                node: node.to_string(),
                port: new.to_string(),
                direction,
            });
        }

        let mut next = self.clone();
        if let Some(port) = next.node_mut(node)?.port_mut(direction, old) {
            port.name = new.to_string();
        }
        let rewritten = next.rewire(|endpoint, side| {
            (side == direction && endpoint.node == node && endpoint.port == old)
                .then(|| Endpoint::new(node, new))
        });
        *self = next;
        Ok(rewritten)
    }

    /// Splits a node into parts that exactly partition its ports.
    ///
    /// Every original port must be assigned to exactly one part; the check
    /// runs before any node is created. Edges follow their port to the part
    /// that now owns it. Returns the new node ids in part order.
    pub fn split_node(&mut self, id: &str, parts: Vec<SplitPart>) -> Result<Vec<String>, CoreError> {
        let original = self.node(id)?.clone();
        let invalid = |reason: String| CoreError::InvalidSplit {
            node: id.to_string(),
            reason,
        };
        if parts.len() < 2 {
            return Err(invalid(format!("need at least 2 parts, got {}", parts.len())));
        }

        let mut owner: HashMap<(PortDirection, String), usize> = HashMap::new();
        for (index, part) in parts.iter().enumerate() {
            for (direction, names) in [
                (PortDirection::Input, &part.inputs),
                (PortDirection::Output, &part.outputs),
            ] {
                for name in names {
                    if !original.has_port(direction, name) {
                        return Err(invalid(format!(
                            "part {index} takes unknown {direction} port '{name}'"
                        )));
                    }
                    if let Some(previous) = owner.insert((direction, name.clone()), index) {
                        return Err(invalid(format!(
                            "{direction} port '{name}' assigned to parts {previous} and {index}"
                        )));
                    }
                }
            }
        }
        for direction in [PortDirection::Input, PortDirection::Output] {
            for port in original.ports(direction) {
                if !owner.contains_key(&(direction, port.name.clone())) {
                    return Err(invalid(format!(
                        "{direction} port '{}' is not assigned to any part",
                        port.name
                    )));
                }
            }
        }

        let mut next = self.clone();
        next.nodes.shift_remove(id);
        let mut created = Vec::with_capacity(parts.len());
        for (index, part) in parts.into_iter().enumerate() {
            let hint = part.hint.clone().unwrap_or_else(|| part.summary.clone());
            let part_id = unique_node_id(&hint, |c| next.contains_node(c));
            let take = |direction: PortDirection| -> Vec<Port> {
                original
                    .ports(direction)
                    .iter()
                    .filter(|p| owner.get(&(direction, p.name.clone())) == Some(&index))
                    .cloned()
                    .collect()
            };
            let node = Node {
                id: part_id.clone(),
                kind: part.kind.unwrap_or(original.kind),
                summary: part.summary,
                language: original.language.clone(),
                framework_hint: original.framework_hint.clone(),
                build_prompt: None,
                tags: original.tags.clone(),
                contracts: Contracts::default(),
                inputs: take(PortDirection::Input),
                outputs: take(PortDirection::Output),
            };
            next.nodes.insert(part_id.clone(), node);
            created.push(part_id);
        }

        next.rewire(|endpoint, direction| {
            if endpoint.node != id {
                return None;
            }
            owner
                .get(&(direction, endpoint.port.clone()))
                .map(|&index| Endpoint::new(created[index].clone(), endpoint.port.clone()))
        });
        *self = next;
        Ok(created)
    }

    /// Merges nodes of one kind into a single node carrying the union of
    /// their ports.
    pub fn merge_nodes(&mut self, request: MergeRequest) -> Result<MergeOutcome, CoreError> {
        let invalid = |reason: String| CoreError::InvalidMerge { reason };
        let mut seen = BTreeSet::new();
        for id in &request.nodes {
            if !seen.insert(id.as_str()) {
                return Err(invalid(format!("node '{id}' listed twice")));
            }
        }
        if request.nodes.len() < 2 {
            return Err(invalid(format!(
                "need at least 2 nodes, got {}",
                request.nodes.len()
            )));
        }
        let sources: Vec<Node> = request
            .nodes
            .iter()
            .map(|id| self.node(id).cloned())
            .collect::<Result<_, _>>()?;

        let kinds: BTreeSet<NodeKind> = sources.iter().map(|n| n.kind).collect();
        if kinds.len() > 1 {
            return Err(CoreError::KindMismatch {
                kinds: kinds.iter().map(NodeKind::as_str).collect::<Vec<_>>().join(", "),
            });
        }

        let fold: BTreeSet<(PortDirection, &str)> = request
            .fold
            .iter()
            .map(|f| (f.direction, f.name.as_str()))
            .collect();
        for (direction, name) in &fold {
            if !sources.iter().any(|n| n.has_port(*direction, name)) {
                return Err(invalid(format!(
                    "fold names unknown {direction} port '{name}'"
                )));
            }
        }

        let mut merged_ports: [Vec<Port>; 2] = [Vec::new(), Vec::new()];
        for (slot, direction) in [PortDirection::Input, PortDirection::Output].into_iter().enumerate() {
            let mut first_owner: HashMap<&str, &str> = HashMap::new();
            for source in &sources {
                for port in source.ports(direction) {
                    match first_owner.get(port.name.as_str()) {
                        None => {
                            first_owner.insert(&port.name, &source.id);
                            merged_ports[slot].push(port.clone());
                        }
                        Some(owner) if fold.contains(&(direction, port.name.as_str())) => {
                            let existing = merged_ports[slot]
                                .iter_mut()
                                .find(|p| p.name == port.name)
                                .ok_or_else(|| invalid(format!("lost folded port '{}'", port.name)))?;
                            match (&existing.port_type, &port.port_type) {
                                (Some(a), Some(b)) if a != b => {
                                    return Err(invalid(format!(
                                        "cannot fold {direction} port '{}': types differ between '{owner}' and '{}'",
                                        port.name, source.id
                                    )));
                                }
                                (None, Some(b)) => existing.port_type = Some(b.clone()),
                                _ => {}
                            }
                            existing.required |= port.required;
                        }
                        Some(owner) => {
                            return Err(invalid(format!(
                                "{direction} port '{}' exists on both '{owner}' and '{}'; fold it explicitly",
                                port.name, source.id
                            )));
                        }
                    }
                }
            }
        }
        let [inputs, outputs] = merged_ports;

        let mut next = self.clone();
        for id in &request.nodes {
            next.nodes.shift_remove(id);
        }
        let hint = request.hint.clone().unwrap_or_else(|| request.nodes[0].clone());
        let merged_id = unique_node_id(&hint, |c| next.contains_node(c));

        let mut contracts = Contracts::default();
        for source in &sources {
            for pre in &source.contracts.pre {
                if !contracts.pre.contains(pre) {
                    contracts.pre.push(pre.clone());
                }
            }
            for post in &source.contracts.post {
                if !contracts.post.contains(post) {
                    contracts.post.push(post.clone());
                }
            }
        }
        let node = Node {
            id: merged_id.clone(),
            kind: sources[0].kind,
            summary: request.summary.clone().unwrap_or_else(|| {
                sources
                    .iter()
                    .map(|n| n.summary.as_str())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ")
            }),
            language: sources.iter().find_map(|n| n.language.clone()),
            framework_hint: sources.iter().find_map(|n| n.framework_hint.clone()),
            build_prompt: sources.iter().find_map(|n| n.build_prompt.clone()),
            tags: sources.iter().flat_map(|n| n.tags.iter().cloned()).collect(),
            contracts,
            inputs,
            outputs,
        };
        next.nodes.insert(merged_id.clone(), node);

        let members: BTreeSet<&str> = request.nodes.iter().map(String::as_str).collect();
        let (internal, external): (Vec<Edge>, Vec<Edge>) = next
            .edges
            .drain(..)
            .partition(|e| members.contains(e.from.node.as_str()) && members.contains(e.to.node.as_str()));
        next.edges = external;
        next.rewire(|endpoint, _| {
            members
                .contains(endpoint.node.as_str())
                .then(|| Endpoint::new(merged_id.clone(), endpoint.port.clone()))
        });

        let mut deduplicated = Vec::new();
        let mut unique: Vec<Edge> = Vec::with_capacity(next.edges.len());
        for edge in next.edges.drain(..) {
            match unique.iter_mut().find(|e| e.connects(&edge.from, &edge.to)) {
                Some(kept) => {
                    kept.order_before |= edge.order_before;
                    deduplicated.push(edge.id);
                }
                None => unique.push(edge),
            }
        }
        next.edges = unique;

        if let Some(path) = DependencyGraph::from_document(&next).find_cycle() {
            return Err(CoreError::CycleDetected { path });
        }

        *self = next;
        Ok(MergeOutcome {
            node: merged_id,
            dropped_edges: internal.into_iter().map(|e| e.id).collect(),
            deduplicated_edges: deduplicated,
        })
    }

    /// Replaces `X.out -> Y.in` with `X.out -> Adapter.in` and
    /// `Adapter.out -> Y.in`.
    pub fn insert_adapter(&mut self, request: AdapterRequest) -> Result<AdapterOutcome, CoreError> {
        let position = match (&request.edge_id, &request.from, &request.to) {
            (Some(id), _, _) => self.edges.iter().position(|e| &e.id == id).ok_or_else(|| {
                CoreError::EdgeNotFound {
                    reference: format!("id '{id}'"),
                }
            })?,
            (None, Some(from), Some(to)) => self
                .edges
                .iter()
                .position(|e| e.connects(from, to))
                .ok_or_else(|| CoreError::EdgeNotFound {
                    reference: format!("{from} -> {to}"),
                })?,
            _ => {
                return Err(CoreError::InvalidArgument {
                    reason: "insert_adapter needs edge_id or both from and to".to_string(),
                })
            }
        };

        let mut next = self.clone();
        let original = next.edges.remove(position);
        let upstream_type = next
            .node(&original.from.node)?
            .port(PortDirection::Output, &original.from.port)
            .and_then(|p| p.port_type.clone());
        let downstream = next.node(&original.to.node)?;
        let downstream_type = downstream
            .port(PortDirection::Input, &original.to.port)
            .and_then(|p| p.port_type.clone());
        let downstream_language = downstream.language.clone();

        let input_name = non_empty(request.input_port).unwrap_or_else(|| "in".to_string());
        let output_name = non_empty(request.output_port).unwrap_or_else(|| "out".to_string());
        let hint = request
            .hint
            .unwrap_or_else(|| format!("{}-to-{}-adapter", original.from.node, original.to.node));

        let mut spec = NewNode::new(hint, NodeKind::Adapter);
        spec.summary = request
            .summary
            .unwrap_or_else(|| format!("Adapts {} to {}", original.from, original.to));
        spec.language = downstream_language;
        spec.inputs.push(Port {
            name: input_name.clone(),
            required: true,
            port_type: upstream_type,
        });
        spec.outputs.push(Port {
            name: output_name.clone(),
            required: true,
            port_type: downstream_type,
        });
        if request.buffer {
            spec.tags.insert(BUFFER_TAG.to_string());
        }
        let adapter = next.add_node(spec)?;

        let upstream = next.add_edge(
            original.from.clone(),
            Endpoint::new(adapter.clone(), input_name),
            original.order_before,
            None,
        )?;
        let downstream = next.add_edge(
            Endpoint::new(adapter.clone(), output_name),
            original.to.clone(),
            original.order_before,
            None,
        )?;

        *self = next;
        Ok(AdapterOutcome {
            adapter,
            removed_edge: original.id,
            edges: vec![upstream, downstream],
        })
    }

    /// Rewrites edge endpoints through `map`, which receives each endpoint and
    /// the port direction it refers to. Edges whose id was derived from their
    /// old endpoints get a freshly derived id. Returns the number of edges
    /// that changed.
    fn rewire<F>(&mut self, map: F) -> usize
    where
        F: Fn(&Endpoint, PortDirection) -> Option<Endpoint>,
    {
        let mut changed = 0;
        for edge in &mut self.edges {
            let from = map(&edge.from, PortDirection::Output);
            let to = map(&edge.to, PortDirection::Input);
            if from.is_none() && to.is_none() {
                continue;
            }
            let was_derived = edge.id == derive_edge_id(&edge.from, &edge.to);
            if let Some(from) = from {
                edge.from = from;
            }
            if let Some(to) = to {
                edge.to = to;
            }
            if was_derived {
                edge.id = derive_edge_id(&edge.from, &edge.to);
            }
            changed += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(hint: &str, inputs: &[&str], outputs: &[&str]) -> NewNode {
        let mut spec = NewNode::new(hint, NodeKind::Module);
        for i in inputs {
            spec = spec.input(Port::new(*i));
        }
        for o in outputs {
            spec = spec.output(Port::new(*o));
        }
        spec
    }

    fn connect(doc: &mut RpgDocument, from: (&str, &str), to: (&str, &str)) -> String {
        doc.add_edge(Endpoint::new(from.0, from.1), Endpoint::new(to.0, to.1), false, None)
            .unwrap()
    }

    /// a.out -> b.in, b.out -> c.in
    fn chain() -> RpgDocument {
        let mut doc = RpgDocument::new("chain");
        doc.add_node(module("A", &[], &["out"])).unwrap();
        doc.add_node(module("B", &["in"], &["out"])).unwrap();
        doc.add_node(module("C", &["in"], &[])).unwrap();
        connect(&mut doc, ("a", "out"), ("b", "in"));
        connect(&mut doc, ("b", "out"), ("c", "in"));
        doc
    }

    #[test]
    fn add_node_generates_deduplicated_ids() {
        let mut doc = RpgDocument::new("g");
        assert_eq!(doc.add_node(NewNode::new("Auth Service", NodeKind::Module)).unwrap(), "auth-service");
        assert_eq!(doc.add_node(NewNode::new("auth service", NodeKind::Atom)).unwrap(), "auth-service-2");
        assert_eq!(doc.nodes["auth-service-2"].kind, NodeKind::Atom);
    }

    #[test]
    fn add_node_rejects_duplicate_port_names() {
        let mut doc = RpgDocument::new("g");
        let err = doc.add_node(module("x", &["a", "a"], &[])).unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePort { .. }));
        assert!(doc.nodes.is_empty());
    }

    #[test]
    fn update_node_clears_with_empty_string() {
        let mut doc = RpgDocument::new("g");
        let id = doc.add_node(NewNode::new("x", NodeKind::Atom).language("rust")).unwrap();
        doc.update_node(
            &id,
            NodeUpdate {
                language: Some(String::new()),
                summary: Some("renamed".into()),
                ..NodeUpdate::default()
            },
        )
        .unwrap();
        let node = &doc.nodes[&id];
        assert!(node.language.is_none());
        assert_eq!(node.summary, "renamed");
    }

    #[test]
    fn delete_node_requires_force_when_connected() {
        let mut doc = chain();
        assert!(matches!(
            doc.delete_node("b", false),
            Err(CoreError::PortHasEdges { count: 2, .. })
        ));
        let removed = doc.delete_node("b", true).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(doc.edges.is_empty());
        assert!(!doc.contains_node("b"));
    }

    #[test]
    fn remove_port_refuses_connected_port() {
        let mut doc = chain();
        assert!(matches!(
            doc.remove_port("b", PortDirection::Input, "in"),
            Err(CoreError::PortHasEdges { .. })
        ));
        doc.add_port("b", PortDirection::Input, Port::new("spare")).unwrap();
        assert!(doc.remove_port("b", PortDirection::Input, "spare").is_ok());
    }

    #[test]
    fn add_port_rejects_name_in_same_direction_only() {
        let mut doc = chain();
        assert!(matches!(
            doc.add_port("b", PortDirection::Input, Port::new("in")),
            Err(CoreError::DuplicatePort { .. })
        ));
        assert!(doc.add_port("b", PortDirection::Output, Port::new("in")).is_ok());
    }

    #[test]
    fn add_edge_checks_endpoints_and_direction() {
        let mut doc = chain();
        let missing = doc.add_edge(Endpoint::new("zz", "out"), Endpoint::new("c", "in"), false, None);
        assert!(matches!(missing, Err(CoreError::NodeNotFound { .. })));
        let wrong = doc.add_edge(Endpoint::new("b", "in"), Endpoint::new("c", "in"), false, None);
        assert!(matches!(wrong, Err(CoreError::DirectionMismatch { .. })));
        assert_eq!(doc.edges.len(), 2);
    }

    #[test]
    fn add_edge_rejects_cycles_and_duplicates() {
        let mut doc = chain();
        doc.add_port("a", PortDirection::Input, Port::new("in")).unwrap();
        let cycle = doc.add_edge(Endpoint::new("c", "out"), Endpoint::new("a", "in"), false, None);
        assert!(matches!(cycle, Err(CoreError::PortNotFound { .. })));
        doc.add_port("c", PortDirection::Output, Port::new("out")).unwrap();
        let cycle = doc.add_edge(Endpoint::new("c", "out"), Endpoint::new("a", "in"), false, None);
        match cycle {
            Err(CoreError::CycleDetected { path }) => assert_eq!(path.first(), path.last()),
            other => panic!("expected cycle, got {other:?}"),
        }
        let dup = doc.add_edge(Endpoint::new("a", "out"), Endpoint::new("b", "in"), true, None);
        assert!(matches!(dup, Err(CoreError::DuplicateEdge { .. })));
        assert_eq!(doc.edges.len(), 2);
    }

    #[test]
    fn caller_supplied_edge_id_is_kept() {
        let mut doc = chain();
        doc.add_port("c", PortDirection::Input, Port::new("side")).unwrap();
        let id = doc
            .add_edge(Endpoint::new("a", "out"), Endpoint::new("c", "side"), true, Some("e-42".into()))
            .unwrap();
        assert_eq!(id, "e-42");
        assert!(doc.edge("e-42").unwrap().order_before);
    }

    #[test]
    fn remove_edge_matches_endpoints() {
        let mut doc = chain();
        let removed = doc
            .remove_edge(&Endpoint::new("a", "out"), &Endpoint::new("b", "in"))
            .unwrap();
        assert_eq!(removed.id, "a.out->b.in");
        assert!(doc
            .remove_edge(&Endpoint::new("a", "out"), &Endpoint::new("b", "in"))
            .is_err());
    }

    #[test]
    fn rename_port_rewrites_incident_edges() {
        let mut doc = chain();
        let rewritten = doc.rename_port("b", PortDirection::Input, "in", "request").unwrap();
        assert_eq!(rewritten, 1);
        assert!(doc.nodes["b"].has_port(PortDirection::Input, "request"));
        let edge = doc.edges.iter().find(|e| e.from.node == "a").unwrap();
        assert_eq!(edge.to, Endpoint::new("b", "request"));
        assert_eq!(edge.id, "a.out->b.request");
    }

    #[test]
    fn rename_port_to_same_name_is_refused() {
        let mut doc = chain();
        let before = doc.clone();
        assert!(matches!(
            doc.rename_port("b", PortDirection::Input, "in", "in"),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn rename_port_rejects_collision() {
        let mut doc = chain();
        doc.add_port("b", PortDirection::Input, Port::new("other")).unwrap();
        let before = doc.clone();
        assert!(matches!(
            doc.rename_port("b", PortDirection::Input, "in", "other"),
            Err(CoreError::DuplicatePort { .. })
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn set_port_type_and_contracts() {
        let mut doc = chain();
        doc.set_port_type("b", PortDirection::Input, "in", Some(serde_json::json!({"t": "bytes"})))
            .unwrap();
        assert!(doc.nodes["b"].inputs[0].port_type.is_some());
        doc.set_port_type("b", PortDirection::Input, "in", None).unwrap();
        assert!(doc.nodes["b"].inputs[0].port_type.is_none());
        doc.set_contracts(
            "b",
            Contracts {
                pre: vec!["input is utf-8".into()],
                post: vec![],
            },
        )
        .unwrap();
        assert_eq!(doc.nodes["b"].contracts.pre.len(), 1);
    }

    #[test]
    fn split_rewires_edges_to_owning_part() {
        let mut doc = RpgDocument::new("split");
        doc.add_node(module("src", &[], &["a", "b"])).unwrap();
        doc.add_node(module("hub", &["x", "y"], &["p", "q"])).unwrap();
        doc.add_node(module("sink", &["m", "n"], &[])).unwrap();
        connect(&mut doc, ("src", "a"), ("hub", "x"));
        connect(&mut doc, ("src", "b"), ("hub", "y"));
        connect(&mut doc, ("hub", "p"), ("sink", "m"));
        connect(&mut doc, ("hub", "q"), ("sink", "n"));

        let created = doc
            .split_node(
                "hub",
                vec![
                    SplitPart {
                        summary: "Reader".into(),
                        hint: None,
                        kind: None,
                        inputs: vec!["x".into()],
                        outputs: vec!["p".into()],
                    },
                    SplitPart {
                        summary: "Writer".into(),
                        hint: Some("hub writer".into()),
                        kind: Some(NodeKind::Atom),
                        inputs: vec!["y".into()],
                        outputs: vec!["q".into()],
                    },
                ],
            )
            .unwrap();
        assert_eq!(created, vec!["reader", "hub-writer"]);
        assert!(!doc.contains_node("hub"));
        assert_eq!(doc.nodes["hub-writer"].kind, NodeKind::Atom);
        let targets: BTreeSet<String> = doc.edges.iter().map(|e| e.to.to_string()).collect();
        assert!(targets.contains("reader.x"));
        assert!(targets.contains("hub-writer.y"));
        let sources: BTreeSet<String> = doc.edges.iter().map(|e| e.from.to_string()).collect();
        assert!(sources.contains("reader.p"));
        assert!(sources.contains("hub-writer.q"));
    }

    #[test]
    fn split_rejects_omitted_input_port() {
        let mut doc = chain();
        doc.add_port("b", PortDirection::Input, Port::new("extra")).unwrap();
        let before = doc.clone();
        let err = doc
            .split_node(
                "b",
                vec![
                    SplitPart {
                        summary: "one".into(),
                        hint: None,
                        kind: None,
                        inputs: vec!["in".into()],
                        outputs: vec![],
                    },
                    SplitPart {
                        summary: "two".into(),
                        hint: None,
                        kind: None,
                        inputs: vec![],
                        outputs: vec!["out".into()],
                    },
                ],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSplit { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn split_rejects_double_assignment() {
        let mut doc = chain();
        let err = doc
            .split_node(
                "b",
                vec![
                    SplitPart {
                        summary: "one".into(),
                        hint: None,
                        kind: None,
                        inputs: vec!["in".into()],
                        outputs: vec!["out".into()],
                    },
                    SplitPart {
                        summary: "two".into(),
                        hint: None,
                        kind: None,
                        inputs: vec!["in".into()],
                        outputs: vec![],
                    },
                ],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSplit { .. }));
    }

    #[test]
    fn merge_unions_disjoint_ports_and_repoints_edges() {
        let mut doc = RpgDocument::new("merge");
        doc.add_node(module("up", &[], &["o1", "o2"])).unwrap();
        doc.add_node(module("left", &["l"], &["lo"])).unwrap();
        doc.add_node(module("right", &["r"], &["ro"])).unwrap();
        doc.add_node(module("down", &["d1", "d2"], &[])).unwrap();
        connect(&mut doc, ("up", "o1"), ("left", "l"));
        connect(&mut doc, ("up", "o2"), ("right", "r"));
        connect(&mut doc, ("left", "lo"), ("down", "d1"));
        connect(&mut doc, ("right", "ro"), ("down", "d2"));

        let outcome = doc
            .merge_nodes(MergeRequest {
                nodes: vec!["left".into(), "right".into()],
                hint: Some("middle".into()),
                summary: None,
                fold: vec![],
            })
            .unwrap();
        assert_eq!(outcome.node, "middle");
        let merged = &doc.nodes["middle"];
        let inputs: Vec<&str> = merged.inputs.iter().map(|p| p.name.as_str()).collect();
        let outputs: Vec<&str> = merged.outputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(inputs, vec!["l", "r"]);
        assert_eq!(outputs, vec!["lo", "ro"]);
        assert!(!doc.contains_node("left") && !doc.contains_node("right"));
        assert_eq!(doc.edges.len(), 4);
        assert!(doc
            .edges
            .iter()
            .all(|e| e.from.node != "left" && e.to.node != "left" && e.from.node != "right" && e.to.node != "right"));
        assert_eq!(doc.edges.iter().filter(|e| e.touches_node("middle")).count(), 4);
    }

    #[test]
    fn merge_rejects_port_collision_unless_folded() {
        let mut doc = RpgDocument::new("merge");
        doc.add_node(module("src", &[], &["o"])).unwrap();
        doc.add_node(module("a", &["data"], &[])).unwrap();
        doc.add_node(module("b", &["data"], &[])).unwrap();
        connect(&mut doc, ("src", "o"), ("a", "data"));
        connect(&mut doc, ("src", "o"), ("b", "data"));

        let request = MergeRequest {
            nodes: vec!["a".into(), "b".into()],
            hint: None,
            summary: None,
            fold: vec![],
        };
        assert!(matches!(
            doc.clone().merge_nodes(request.clone()),
            Err(CoreError::InvalidMerge { .. })
        ));

        let outcome = doc
            .merge_nodes(MergeRequest {
                fold: vec![PortRef {
                    direction: PortDirection::Input,
                    name: "data".into(),
                }],
                ..request
            })
            .unwrap();
        assert_eq!(outcome.node, "a");
        assert_eq!(doc.nodes["a"].inputs.len(), 1);
        assert_eq!(doc.edges.len(), 1);
        assert_eq!(outcome.deduplicated_edges.len(), 1);
    }

    #[test]
    fn merge_rejects_mixed_kinds_and_cycles() {
        let mut doc = chain();
        doc.add_node(NewNode::new("t", NodeKind::Test)).unwrap();
        assert!(matches!(
            doc.merge_nodes(MergeRequest {
                nodes: vec!["a".into(), "t".into()],
                hint: None,
                summary: None,
                fold: vec![],
            }),
            Err(CoreError::KindMismatch { .. })
        ));

        // a -> b -> c; merging a and c closes a loop through b.
        let before = doc.clone();
        assert!(matches!(
            doc.merge_nodes(MergeRequest {
                nodes: vec!["a".into(), "c".into()],
                hint: None,
                summary: None,
                fold: vec![],
            }),
            Err(CoreError::CycleDetected { .. })
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn merge_drops_internal_edges() {
        let mut doc = chain();
        let outcome = doc
            .merge_nodes(MergeRequest {
                nodes: vec!["a".into(), "b".into()],
                hint: Some("ab".into()),
                summary: None,
                fold: vec![PortRef {
                    direction: PortDirection::Output,
                    name: "out".into(),
                }],
            })
            .unwrap();
        assert_eq!(outcome.dropped_edges, vec!["a.out->b.in"]);
        assert_eq!(doc.edges.len(), 1);
        assert_eq!(doc.edges[0].from, Endpoint::new("ab", "out"));
    }

    #[test]
    fn insert_adapter_replaces_edge_with_two() {
        let mut doc = chain();
        doc.set_port_type("a", PortDirection::Output, "out", Some(serde_json::json!("json")))
            .unwrap();
        let outcome = doc
            .insert_adapter(AdapterRequest {
                from: Some(Endpoint::new("a", "out")),
                to: Some(Endpoint::new("b", "in")),
                buffer: true,
                ..AdapterRequest::default()
            })
            .unwrap();
        assert_eq!(outcome.adapter, "a-to-b-adapter");
        assert_eq!(outcome.removed_edge, "a.out->b.in");
        assert!(doc.edge("a.out->b.in").is_none());

        let adapter = &doc.nodes[&outcome.adapter];
        assert_eq!(adapter.kind, NodeKind::Adapter);
        assert!(adapter.tags.contains(BUFFER_TAG));
        assert_eq!(adapter.inputs[0].port_type, Some(serde_json::json!("json")));

        let around: Vec<String> = doc
            .edges
            .iter()
            .filter(|e| e.touches_node(&outcome.adapter))
            .map(|e| e.to_string())
            .collect();
        assert_eq!(
            around,
            vec!["a.out -> a-to-b-adapter.in", "a-to-b-adapter.out -> b.in"]
        );
    }

    #[test]
    fn insert_adapter_on_missing_edge_fails() {
        let mut doc = chain();
        assert!(matches!(
            doc.insert_adapter(AdapterRequest {
                edge_id: Some("nope".into()),
                ..AdapterRequest::default()
            }),
            Err(CoreError::EdgeNotFound { .. })
        ));
        assert!(matches!(
            doc.insert_adapter(AdapterRequest::default()),
            Err(CoreError::InvalidArgument { .. })
        ));
    }
}
