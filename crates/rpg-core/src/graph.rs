//! DependencyGraph: a petgraph view of the document's edge list.
//!
//! The document stores nodes and edges in flat collections; scheduling and
//! cycle detection want adjacency. [`DependencyGraph`] is built on demand
//! from a document and is never persisted. Every edge, data or
//! `order_before`, becomes a dependency of `to.node` on `from.node`.
//!
//! Nodes are inserted in id order, so petgraph indices follow id order and
//! every traversal below is deterministic.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::document::RpgDocument;
use crate::edge::Endpoint;

/// Why one node depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Plain data connection.
    Data,
    /// Data connection that also carries `order_before`.
    Ordered,
}

/// Result of Kahn layering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layering {
    /// Successive layers, each sorted by node id.
    pub layers: Vec<Vec<String>>,
    /// Nodes that could never be placed. Non-empty only for cyclic graphs.
    pub remaining: Vec<String>,
}

impl Layering {
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn width(&self) -> usize {
        self.layers.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Layer index per node id.
    pub fn layer_of(&self) -> HashMap<&str, usize> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| layer.iter().map(move |id| (id.as_str(), i)))
            .collect()
    }
}

/// Directed dependency graph over node ids.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, DependencyKind, u32>,
    index: HashMap<String, NodeIndex<u32>>,
}

impl DependencyGraph {
    /// Builds the view from a document. Edges whose endpoints do not name
    /// existing nodes are skipped; the validator reports them separately.
    pub fn from_document(doc: &RpgDocument) -> Self {
        let mut ids: Vec<&String> = doc.nodes.keys().collect();
        ids.sort();

        let mut graph = DiGraph::<String, DependencyKind, u32>::with_capacity(ids.len(), doc.edges.len());
        let mut index = HashMap::with_capacity(ids.len());
        for id in ids {
            let idx = graph.add_node(id.clone());
            index.insert(id.clone(), idx);
        }

        let mut dep = DependencyGraph { graph, index };
        for edge in &doc.edges {
            let kind = if edge.order_before {
                DependencyKind::Ordered
            } else {
                DependencyKind::Data
            };
            dep.add_dependency(&edge.from.node, &edge.to.node, kind);
        }
        dep
    }

    /// Adds a dependency of `to` on `from`. Returns `false` if either node is
    /// unknown.
    pub fn add_dependency(&mut self, from: &str, to: &str, kind: DependencyKind) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => {
                self.graph.add_edge(a, b, kind);
                true
            }
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Distinct nodes `id` depends on, sorted.
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Distinct nodes depending on `id`, sorted.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Kahn-style layering: each layer holds every node whose dependencies
    /// all sit in earlier layers.
    pub fn layers(&self) -> Layering {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.edges_directed(n, Direction::Incoming).count())
            .collect();
        let mut placed = vec![false; self.graph.node_count()];

        let mut frontier: Vec<NodeIndex<u32>> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();

        let mut layers = Vec::new();
        while !frontier.is_empty() {
            frontier.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            let mut next = Vec::new();
            for &n in &frontier {
                placed[n.index()] = true;
                for edge in self.graph.edges_directed(n, Direction::Outgoing) {
                    let target = edge.target();
                    in_degree[target.index()] -= 1;
                    if in_degree[target.index()] == 0 {
                        next.push(target);
                    }
                }
            }
            layers.push(frontier.iter().map(|n| self.graph[*n].clone()).collect());
            frontier = next;
        }

        let mut remaining: Vec<String> = self
            .graph
            .node_indices()
            .filter(|n| !placed[n.index()])
            .map(|n| self.graph[n].clone())
            .collect();
        remaining.sort();

        Layering { layers, remaining }
    }

    /// Returns one offending cycle as a node-id path that starts and ends on
    /// the same node, or `None` if the graph is acyclic.
    ///
    /// The reported cycle lives in the strongly connected component with the
    /// smallest member id and is walked by always stepping to the smallest
    /// successor inside that component.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut cyclic: Vec<Vec<NodeIndex<u32>>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0])
            })
            .collect();
        for scc in &mut cyclic {
            scc.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        }
        cyclic.sort_by(|a, b| self.graph[a[0]].cmp(&self.graph[b[0]]));
        let scc = cyclic.first()?;

        let members: BTreeSet<NodeIndex<u32>> = scc.iter().copied().collect();
        let mut path: Vec<NodeIndex<u32>> = vec![scc[0]];
        let mut position: HashMap<NodeIndex<u32>, usize> = HashMap::from([(scc[0], 0)]);
        let mut current = scc[0];
        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|n| members.contains(n))
                .min_by(|a, b| self.graph[*a].cmp(&self.graph[*b]))?;
            if let Some(&start) = position.get(&next) {
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|n| self.graph[*n].clone()).collect();
                cycle.push(self.graph[next].clone());
                return Some(cycle);
            }
            position.insert(next, path.len());
            path.push(next);
            current = next;
        }
    }
}

/// Checks whether connecting `from` to `to` would close a cycle in `doc`.
///
/// Returns the offending path on failure. Used by the edit operations as a
/// topological attempt before the candidate document is accepted.
pub fn cycle_with_edge(doc: &RpgDocument, from: &Endpoint, to: &Endpoint) -> Option<Vec<String>> {
    if from.node == to.node {
        return Some(vec![from.node.clone(), to.node.clone()]);
    }
    let mut graph = DependencyGraph::from_document(doc);
    graph.add_dependency(&from.node, &to.node, DependencyKind::Data);
    if graph.layers().is_complete() {
        None
    } else {
        graph.find_cycle()
    }
}
