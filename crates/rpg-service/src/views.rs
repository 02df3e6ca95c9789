//! Builders for the read-only views and the Graphviz export.

use std::fmt::Write;

use rpg_core::{DependencyGraph, Node, RpgDocument};
use rpg_plan::emit_impl_batches;

use crate::schema::views::{EdgeSummary, ImplView, NodeSummary, RpgView};

pub fn rpg_view(doc: &RpgDocument) -> RpgView {
    let layering = DependencyGraph::from_document(doc).layers();
    let layer_of = layering.layer_of();

    let mut ids: Vec<&String> = doc.nodes.keys().collect();
    ids.sort();
    let nodes = ids
        .into_iter()
        .map(|id| {
            let node = &doc.nodes[id];
            NodeSummary {
                id: id.clone(),
                kind: node.kind,
                summary: node.summary.clone(),
                inputs: node.inputs.iter().map(|p| p.name.clone()).collect(),
                outputs: node.outputs.iter().map(|p| p.name.clone()).collect(),
                in_degree: doc.edges.iter().filter(|e| e.to.node == *id).count(),
                out_degree: doc.edges.iter().filter(|e| e.from.node == *id).count(),
                layer: layer_of.get(id.as_str()).copied(),
            }
        })
        .collect();

    let mut edges: Vec<EdgeSummary> = doc
        .edges
        .iter()
        .map(|e| EdgeSummary {
            id: e.id.clone(),
            from: e.from.to_string(),
            to: e.to.to_string(),
            order_before: e.order_before,
        })
        .collect();
    edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

    RpgView {
        goal: doc.goal.clone(),
        rev: doc.rev,
        depth: layering.depth(),
        nodes,
        edges,
    }
}

pub fn impl_view(doc: &RpgDocument) -> ImplView {
    let blocker = emit_impl_batches(doc).err().map(|e| e.to_string());
    ImplView {
        rev: doc.rev,
        ready: blocker.is_none(),
        blocker,
        file_layout: doc.file_layout.clone(),
        impl_plan_preview: doc.impl_plan_preview.clone(),
    }
}

// ---------------------------------------------------------------------------
// DOT
// ---------------------------------------------------------------------------

/// Escapes text for a record label field.
fn escape_record(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' | '}' | '|' | '<' | '>' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn record_label(node: &Node) -> String {
    let side = |prefix: char, names: Vec<&str>| -> String {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("<{prefix}{i}> {}", escape_record(name)))
            .collect::<Vec<_>>()
            .join("|")
    };
    let inputs = side('i', node.inputs.iter().map(|p| p.name.as_str()).collect());
    let outputs = side('o', node.outputs.iter().map(|p| p.name.as_str()).collect());
    format!(
        "{{{{{inputs}}}|{}\\n({})|{{{outputs}}}}}",
        escape_record(&node.id),
        node.kind.as_str()
    )
}

fn port_index(node: &Node, input: bool, name: &str) -> Option<usize> {
    let ports = if input { &node.inputs } else { &node.outputs };
    ports.iter().position(|p| p.name == name)
}

/// Renders the graph as Graphviz DOT: one record per node listing its
/// inputs and outputs, one edge per connection, `order_before` dashed.
pub fn export_dot(doc: &RpgDocument) -> String {
    let mut output = String::new();
    output.push_str("digraph rpg {\n");
    output.push_str("  rankdir=LR;\n");
    output.push_str("  node [shape=record, fontname=\"Helvetica\", fontsize=10];\n");
    output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n");

    let mut ids: Vec<&String> = doc.nodes.keys().collect();
    ids.sort();
    for id in &ids {
        let node = &doc.nodes[*id];
        let _ = writeln!(
            output,
            "  \"{}\" [label=\"{}\"];",
            escape_record(id),
            record_label(node)
        );
    }

    let mut edges: Vec<_> = doc.edges.iter().collect();
    edges.sort_by(|a, b| a.canonical_cmp(b));
    for edge in edges {
        let from = doc
            .nodes
            .get(&edge.from.node)
            .and_then(|n| port_index(n, false, &edge.from.port))
            .map(|i| format!(":o{i}"))
            .unwrap_or_default();
        let to = doc
            .nodes
            .get(&edge.to.node)
            .and_then(|n| port_index(n, true, &edge.to.port))
            .map(|i| format!(":i{i}"))
            .unwrap_or_default();
        let style = if edge.order_before {
            " [style=dashed]"
        } else {
            ""
        };
        let _ = writeln!(
            output,
            "  \"{}\"{from} -> \"{}\"{to}{style};",
            escape_record(&edge.from.node),
            escape_record(&edge.to.node)
        );
    }

    output.push_str("}\n");
    output
}
