//! Implementation batches: Kahn layering of a validated, laid-out graph.
//!
//! Each batch holds every node whose dependencies (data and `order_before`
//! edges alike) sit in earlier batches. Within a batch, nodes are ordered by
//! id. Durations are not modelled; every node costs one unit.

use rpg_check::validate_graph;
use rpg_core::{BatchItem, DependencyGraph, ImplBatch, ImplPlan, RpgDocument};

use crate::error::PlanError;

/// Emits the batch plan. Requires a file layout covering every node and a
/// graph with no hard validation errors.
pub fn emit_impl_batches(doc: &RpgDocument) -> Result<ImplPlan, PlanError> {
    let Some(layout) = doc.file_layout.as_ref() else {
        return Err(PlanError::NotReady {
            reason: "no file layout; plan one first".to_string(),
            errors: Vec::new(),
        });
    };

    let mut uncovered: Vec<&str> = doc
        .nodes
        .keys()
        .filter(|id| !layout.files.contains_key(*id))
        .map(String::as_str)
        .collect();
    if !uncovered.is_empty() {
        uncovered.sort_unstable();
        return Err(PlanError::NotReady {
            reason: format!("file layout does not cover: {}", uncovered.join(", ")),
            errors: Vec::new(),
        });
    }

    let report = validate_graph(doc);
    if !report.is_valid() {
        return Err(PlanError::NotReady {
            reason: format!("graph has {} validation error(s)", report.errors.len()),
            errors: report.errors,
        });
    }

    let graph = DependencyGraph::from_document(doc);
    let layering = graph.layers();
    if !layering.is_complete() {
        return Err(PlanError::CycleDetected {
            path: graph.find_cycle().unwrap_or(layering.remaining),
        });
    }

    let batches = layering
        .layers
        .iter()
        .enumerate()
        .map(|(index, layer)| ImplBatch {
            index,
            items: layer
                .iter()
                .filter_map(|id| {
                    let node = doc.nodes.get(id)?;
                    let files = layout.files.get(id);
                    Some(BatchItem {
                        node: id.clone(),
                        kind: node.kind,
                        source: files.map(|f| f.source.clone()),
                        test: files.and_then(|f| f.test.clone()),
                        build_prompt: node.build_prompt.clone(),
                        depends_on: graph.dependencies(id),
                    })
                })
                .collect(),
        })
        .collect();

    Ok(ImplPlan { batches })
}

/// Deprecated name for [`emit_impl_batches`].
#[deprecated(note = "use emit_impl_batches")]
pub fn build_impl_plan(doc: &RpgDocument) -> Result<ImplPlan, PlanError> {
    emit_impl_batches(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{plan_file_layout, LayoutRequest};
    use rpg_core::{Endpoint, NewNode, NodeKind, Port};

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> RpgDocument {
        let mut doc = RpgDocument::new("batches");
        for id in nodes {
            doc.add_node(
                NewNode::new(*id, NodeKind::Module)
                    .input(Port::new("in").optional())
                    .output(Port::new("out")),
            )
            .unwrap();
        }
        for (a, b) in edges {
            doc.add_edge(Endpoint::new(*a, "out"), Endpoint::new(*b, "in"), false, None)
                .unwrap();
        }
        doc
    }

    fn laid_out(mut doc: RpgDocument) -> RpgDocument {
        doc.file_layout = Some(plan_file_layout(&doc, &LayoutRequest::default()).unwrap());
        doc
    }

    #[test]
    fn chain_yields_singleton_batches() {
        let doc = laid_out(graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));
        let plan = emit_impl_batches(&doc).unwrap();
        assert_eq!(plan.layers(), vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(plan.batches[2].items[0].depends_on, vec!["b"]);
        assert_eq!(
            plan.batches[0].items[0].source.as_deref(),
            Some("src/modules/a.py")
        );
    }

    #[test]
    fn diamond_groups_the_middle() {
        let mut doc = graph(&["a", "b", "c", "d"], &[]);
        // Separate ports on d so both middle nodes can feed it.
        doc.add_port("d", rpg_core::PortDirection::Input, Port::new("in2").optional())
            .unwrap();
        let edges = [
            (("a", "out"), ("b", "in")),
            (("a", "out"), ("c", "in")),
            (("b", "out"), ("d", "in")),
            (("c", "out"), ("d", "in2")),
        ];
        for (from, to) in edges {
            doc.add_edge(Endpoint::new(from.0, from.1), Endpoint::new(to.0, to.1), false, None)
                .unwrap();
        }
        let plan = emit_impl_batches(&laid_out(doc)).unwrap();
        assert_eq!(plan.layers(), vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
        assert_eq!(plan.batches[2].items[0].depends_on, vec!["b", "c"]);
    }

    #[test]
    fn order_before_edges_also_sequence() {
        let mut doc = graph(&["setup", "work"], &[]);
        doc.add_edge(Endpoint::new("setup", "out"), Endpoint::new("work", "in"), true, None)
            .unwrap();
        let plan = emit_impl_batches(&laid_out(doc)).unwrap();
        assert_eq!(plan.layers(), vec![vec!["setup"], vec!["work"]]);
    }

    #[test]
    fn missing_layout_is_not_ready() {
        let doc = graph(&["a"], &[]);
        assert!(matches!(
            emit_impl_batches(&doc),
            Err(PlanError::NotReady { .. })
        ));
    }

    #[test]
    fn stale_layout_is_not_ready() {
        let mut doc = laid_out(graph(&["a"], &[]));
        doc.add_node(NewNode::new("late", NodeKind::Atom)).unwrap();
        match emit_impl_batches(&doc) {
            Err(PlanError::NotReady { reason, .. }) => assert!(reason.contains("late")),
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[test]
    fn invalid_graph_is_not_ready() {
        let mut doc = laid_out(graph(&["a", "b"], &[("a", "b")]));
        doc.edges[0].to.port = "missing".into();
        match emit_impl_batches(&doc) {
            Err(PlanError::NotReady { errors, .. }) => assert!(!errors.is_empty()),
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[test]
    #[allow(deprecated)]
    fn deprecated_alias_matches() {
        let doc = laid_out(graph(&["a", "b"], &[("a", "b")]));
        assert_eq!(build_impl_plan(&doc).unwrap(), emit_impl_batches(&doc).unwrap());
    }
}
