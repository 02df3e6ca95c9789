//! Advisory quality score.
//!
//! The score blends capability coverage, adapter overhead and how much of
//! the graph can be built in parallel. There is no pass/fail threshold.

use serde::{Deserialize, Serialize};

use rpg_core::{DependencyGraph, NodeKind, RpgDocument};

use crate::error::CheckError;

const COVERAGE_WEIGHT: f64 = 0.5;
const ADAPTER_WEIGHT: f64 = 0.2;
const PARALLELISM_WEIGHT: f64 = 0.3;

/// Breakdown of the score and hints for improving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: f64,
    pub coverage: f64,
    pub adapter_ratio: f64,
    pub depth: usize,
    pub width: usize,
    pub parallelism: f64,
    pub nodes: usize,
    pub hints: Vec<String>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scores a document. Cyclic graphs have no layering and are refused.
pub fn score_ir(doc: &RpgDocument) -> Result<ScoreReport, CheckError> {
    let graph = DependencyGraph::from_document(doc);
    let layering = graph.layers();
    if !layering.is_complete() {
        return Err(CheckError::CycleDetected {
            path: graph.find_cycle().unwrap_or(layering.remaining),
        });
    }

    let nodes = doc.nodes.len();
    let tagged: Vec<&String> = doc.nodes.values().flat_map(|n| n.tags.iter()).collect();
    let uncovered: Vec<&String> = doc
        .capabilities
        .iter()
        .filter(|c| !tagged.contains(c))
        .collect();
    let coverage = if doc.capabilities.is_empty() {
        1.0
    } else {
        (doc.capabilities.len() - uncovered.len()) as f64 / doc.capabilities.len() as f64
    };

    let adapters = doc
        .nodes
        .values()
        .filter(|n| n.kind == NodeKind::Adapter)
        .count();
    let adapter_ratio = if nodes == 0 {
        0.0
    } else {
        adapters as f64 / nodes as f64
    };

    let depth = layering.depth();
    let width = layering.width();
    let parallelism = if nodes <= 1 {
        1.0
    } else {
        1.0 - (depth.saturating_sub(1)) as f64 / (nodes - 1) as f64
    };

    let score = 100.0
        * (COVERAGE_WEIGHT * coverage
            + ADAPTER_WEIGHT * (1.0 - (2.0 * adapter_ratio).min(1.0))
            + PARALLELISM_WEIGHT * parallelism);

    let mut hints = Vec::new();
    if !uncovered.is_empty() {
        let names: Vec<&str> = uncovered.iter().map(|c| c.as_str()).collect();
        hints.push(format!(
            "tag nodes with the uncovered capabilities: {}",
            names.join(", ")
        ));
    }
    if adapter_ratio > 0.25 {
        hints.push(format!(
            "{adapters} of {nodes} nodes are adapters; align port types or languages to drop some"
        ));
    }
    if nodes > 2 && parallelism < 0.5 {
        hints.push(format!(
            "the graph is {depth} layers deep for {nodes} nodes; break long chains to allow parallel work"
        ));
    }

    Ok(ScoreReport {
        score: round1(score),
        coverage: round1(coverage * 100.0) / 100.0,
        adapter_ratio,
        depth,
        width,
        parallelism,
        nodes,
        hints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::{Endpoint, NewNode, Port};

    fn chain(len: usize) -> RpgDocument {
        let mut doc = RpgDocument::new("chain");
        for i in 0..len {
            doc.add_node(
                NewNode::new(format!("n{i}"), NodeKind::Module)
                    .input(Port::new("in"))
                    .output(Port::new("out")),
            )
            .unwrap();
        }
        for i in 1..len {
            doc.add_edge(
                Endpoint::new(format!("n{}", i - 1), "out"),
                Endpoint::new(format!("n{i}"), "in"),
                false,
                None,
            )
            .unwrap();
        }
        doc
    }

    #[test]
    fn empty_document_scores_full() {
        let report = score_ir(&RpgDocument::new("empty")).unwrap();
        assert_eq!(report.score, 100.0);
        assert!(report.hints.is_empty());
    }

    #[test]
    fn long_chain_loses_parallelism() {
        let report = score_ir(&chain(3)).unwrap();
        assert_eq!(report.depth, 3);
        assert_eq!(report.width, 1);
        assert_eq!(report.parallelism, 0.0);
        assert_eq!(report.score, 70.0);
        assert_eq!(report.hints.len(), 1);
    }

    #[test]
    fn uncovered_capabilities_and_adapters_lower_score() {
        let mut doc = RpgDocument::new("g");
        doc.capabilities.insert("auth".into());
        doc.capabilities.insert("billing".into());
        doc.add_node(NewNode::new("a", NodeKind::Module).tag("auth")).unwrap();
        doc.add_node(NewNode::new("b", NodeKind::Adapter)).unwrap();
        let report = score_ir(&doc).unwrap();
        assert_eq!(report.coverage, 0.5);
        assert_eq!(report.adapter_ratio, 0.5);
        // 100 * (0.5*0.5 + 0.2*0 + 0.3*1)
        assert_eq!(report.score, 55.0);
        assert_eq!(report.hints.len(), 2);
    }
}
