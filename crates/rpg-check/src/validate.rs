//! Whole-document validation.
//!
//! [`validate_graph`] runs, in order: structural checks on nodes and edges,
//! cycle detection by Kahn layering over data and `order_before` edges, and
//! the advisory coverage checks. It never stops at the first finding.

use std::collections::{BTreeSet, HashSet};

use rpg_core::{DependencyGraph, Endpoint, PortDirection, RpgDocument};

use crate::diagnostics::{Diagnostic, DiagnosticCode, ValidationReport};

/// Validates a document and reports every finding at once.
pub fn validate_graph(doc: &RpgDocument) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_nodes(doc, &mut report);
    check_edges(doc, &mut report);
    check_cycles(doc, &mut report);
    check_capabilities(doc, &mut report);
    check_io_boundaries(doc, &mut report);
    check_required_inputs(doc, &mut report);
    check_isolated_nodes(doc, &mut report);
    report
}

fn sorted_ids(doc: &RpgDocument) -> Vec<&String> {
    let mut ids: Vec<&String> = doc.nodes.keys().collect();
    ids.sort();
    ids
}

// ---------------------------------------------------------------------------
// Structural checks (hard)
// ---------------------------------------------------------------------------

fn check_nodes(doc: &RpgDocument, report: &mut ValidationReport) {
    for id in sorted_ids(doc) {
        let node = &doc.nodes[id];
        if &node.id != id {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateId,
                    format!("node stored under '{id}' carries id '{}'", node.id),
                )
                .on_node(id.clone()),
            );
        }
        for direction in [PortDirection::Input, PortDirection::Output] {
            let mut seen = HashSet::new();
            for port in node.ports(direction) {
                if !seen.insert(port.name.as_str()) {
                    report.push(
                        Diagnostic::error(
                            DiagnosticCode::DuplicatePort,
                            format!("{direction} port '{}' declared twice on '{id}'", port.name),
                        )
                        .on_node(id.clone()),
                    );
                }
            }
        }
    }
}

/// Checks one endpoint against the expected port direction.
fn check_endpoint(
    doc: &RpgDocument,
    edge_id: &str,
    endpoint: &Endpoint,
    direction: PortDirection,
    report: &mut ValidationReport,
) {
    let Some(node) = doc.nodes.get(&endpoint.node) else {
        report.push(
            Diagnostic::error(
                DiagnosticCode::NotFound,
                format!("edge '{edge_id}' references missing node '{}'", endpoint.node),
            )
            .on_edge(edge_id),
        );
        return;
    };
    if node.has_port(direction, &endpoint.port) {
        return;
    }
    let diagnostic = if node.has_port(direction.opposite(), &endpoint.port) {
        Diagnostic::error(
            DiagnosticCode::DirectionMismatch,
            format!(
                "edge '{edge_id}' uses {} port '{endpoint}' where an {direction} port is required",
                direction.opposite()
            ),
        )
    } else {
        Diagnostic::error(
            DiagnosticCode::NotFound,
            format!("edge '{edge_id}' references missing {direction} port '{endpoint}'"),
        )
    };
    report.push(diagnostic.on_edge(edge_id).on_node(endpoint.node.clone()));
}

fn check_edges(doc: &RpgDocument, report: &mut ValidationReport) {
    let mut ids = HashSet::new();
    let mut connections = HashSet::new();
    for edge in &doc.edges {
        if !ids.insert(edge.id.as_str()) {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateId,
                    format!("edge id '{}' is used more than once", edge.id),
                )
                .on_edge(edge.id.clone()),
            );
        }
        if !connections.insert((&edge.from, &edge.to)) {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateEdge,
                    format!("{edge} is connected more than once"),
                )
                .on_edge(edge.id.clone()),
            );
        }
        if edge.from.node == edge.to.node {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::SelfLoop,
                    format!("edge '{}' connects '{}' to itself", edge.id, edge.from.node),
                )
                .on_edge(edge.id.clone())
                .on_node(edge.from.node.clone()),
            );
        }
        check_endpoint(doc, &edge.id, &edge.from, PortDirection::Output, report);
        check_endpoint(doc, &edge.id, &edge.to, PortDirection::Input, report);
    }
}

fn check_cycles(doc: &RpgDocument, report: &mut ValidationReport) {
    // Self-loops are already reported on their own.
    let mut view = doc.clone();
    view.edges.retain(|e| e.from.node != e.to.node);

    let graph = DependencyGraph::from_document(&view);
    let layering = graph.layers();
    if layering.is_complete() {
        return;
    }
    let path = graph.find_cycle().unwrap_or(layering.remaining);
    report.push(
        Diagnostic::error(
            DiagnosticCode::CycleDetected,
            format!("dependency cycle: {}", path.join(" -> ")),
        )
        .with_path(path),
    );
}

// ---------------------------------------------------------------------------
// Design-quality checks (soft)
// ---------------------------------------------------------------------------

fn check_capabilities(doc: &RpgDocument, report: &mut ValidationReport) {
    let tagged: BTreeSet<&str> = doc
        .nodes
        .values()
        .flat_map(|n| n.tags.iter().map(String::as_str))
        .collect();
    for capability in &doc.capabilities {
        if !tagged.contains(capability.as_str()) {
            report.push(Diagnostic::warning(
                DiagnosticCode::CapabilityUncovered,
                format!("capability '{capability}' is not tagged on any node"),
            ));
        }
    }
}

fn check_io_boundaries(doc: &RpgDocument, report: &mut ValidationReport) {
    let sides = [
        (PortDirection::Input, &doc.io_boundaries.inputs),
        (PortDirection::Output, &doc.io_boundaries.outputs),
    ];
    for (direction, boundaries) in sides {
        for boundary in boundaries {
            let covered = doc
                .nodes
                .values()
                .any(|n| n.has_port(direction, &boundary.id) || n.tags.contains(&boundary.id));
            if !covered {
                report.push(Diagnostic::warning(
                    DiagnosticCode::IoBoundaryUncovered,
                    format!(
                        "external {direction} '{}' ({}) has no matching {direction} port or tag",
                        boundary.id, boundary.kind
                    ),
                ));
            }
        }
    }
}

fn check_required_inputs(doc: &RpgDocument, report: &mut ValidationReport) {
    let external: HashSet<&str> = doc
        .io_boundaries
        .inputs
        .iter()
        .map(|b| b.id.as_str())
        .collect();
    for id in sorted_ids(doc) {
        for port in doc.nodes[id].inputs.iter().filter(|p| p.required) {
            let bound = doc.port_edges(id, PortDirection::Input, &port.name).next().is_some();
            if !bound && !external.contains(port.name.as_str()) {
                report.push(
                    Diagnostic::warning(
                        DiagnosticCode::RequiredInputUnbound,
                        format!("required input '{id}.{}' has no incoming edge", port.name),
                    )
                    .on_node(id.clone()),
                );
            }
        }
    }
}

fn check_isolated_nodes(doc: &RpgDocument, report: &mut ValidationReport) {
    if doc.nodes.len() < 2 {
        return;
    }
    for id in sorted_ids(doc) {
        if doc.incident_edges(id).next().is_none() {
            report.push(
                Diagnostic::warning(
                    DiagnosticCode::IsolatedNode,
                    format!("node '{id}' has no edges"),
                )
                .on_node(id.clone()),
            );
        }
    }
}
