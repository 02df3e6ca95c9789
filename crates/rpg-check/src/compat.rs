//! Compatibility heuristics: runtime and license constraints, plus pairwise
//! checks between connected nodes.
//!
//! Everything here is a warning. Only `strict` mode turns findings into a
//! refusal.

use rpg_core::{canonical_json, Edge, Node, NodeKind, PortDirection, RpgDocument};

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::CheckError;

/// Tag prefix declaring a node's license.
pub const LICENSE_TAG_PREFIX: &str = "license:";

/// Groups languages that share a toolchain, so TypeScript talking to
/// JavaScript is not a boundary.
fn ecosystem(language: &str) -> String {
    match language.to_ascii_lowercase().as_str() {
        "typescript" | "ts" | "javascript" | "js" => "node".to_string(),
        "python" | "py" => "python".to_string(),
        "rust" | "rs" => "rust".to_string(),
        "golang" | "go" => "go".to_string(),
        "java" | "kotlin" => "jvm".to_string(),
        other => other.to_string(),
    }
}

/// Ecosystem a test framework belongs to, if it is one we recognise.
fn test_framework_ecosystem(hint: &str) -> Option<&'static str> {
    let hint = hint.to_ascii_lowercase();
    let known: [(&[&str], &str); 5] = [
        (&["pytest", "unittest", "nose", "hypothesis"], "python"),
        (&["jest", "vitest", "mocha", "jasmine", "ava", "playwright"], "node"),
        (&["cargo", "nextest", "proptest"], "rust"),
        (&["gotest", "go test", "testify", "ginkgo"], "go"),
        (&["junit", "testng", "spock"], "jvm"),
    ];
    known
        .iter()
        .find(|(names, _)| names.iter().any(|n| hint.contains(n)))
        .map(|(_, eco)| *eco)
}

/// Checks the document against its constraints and the connected-node
/// heuristics. With `strict`, any finding becomes [`CheckError::Incompatible`].
pub fn validate_compatibility(
    doc: &RpgDocument,
    strict: bool,
) -> Result<Vec<Diagnostic>, CheckError> {
    let mut warnings = Vec::new();

    let mut ids: Vec<&String> = doc.nodes.keys().collect();
    ids.sort();
    for id in ids {
        let node = &doc.nodes[id];
        check_runtime(doc, node, &mut warnings);
        check_licenses(doc, node, &mut warnings);
    }

    let mut edges: Vec<&Edge> = doc.edges.iter().collect();
    edges.sort_by(|a, b| a.canonical_cmp(b));
    for edge in edges {
        let (Some(from), Some(to)) = (doc.nodes.get(&edge.from.node), doc.nodes.get(&edge.to.node))
        else {
            continue;
        };
        check_language_boundary(edge, from, to, &mut warnings);
        check_test_ecosystem(edge, from, to, &mut warnings);
        check_port_types(edge, from, to, &mut warnings);
    }

    if strict && !warnings.is_empty() {
        return Err(CheckError::Incompatible {
            diagnostics: warnings,
        });
    }
    Ok(warnings)
}

fn check_runtime(doc: &RpgDocument, node: &Node, out: &mut Vec<Diagnostic>) {
    let allowed = &doc.constraints.runtime;
    let Some(language) = &node.language else {
        return;
    };
    // Aliases and sibling languages share a runtime: `ts` and `node` both
    // admit a `typescript` node.
    let runtime = ecosystem(language);
    if allowed.is_empty() || allowed.iter().any(|r| ecosystem(r) == runtime) {
        return;
    }
    out.push(
        Diagnostic::warning(
            DiagnosticCode::RuntimeNotAllowed,
            format!(
                "'{}' uses {language}, outside the allowed runtimes [{}]",
                node.id,
                allowed.join(", ")
            ),
        )
        .on_node(node.id.clone()),
    );
}

fn check_licenses(doc: &RpgDocument, node: &Node, out: &mut Vec<Diagnostic>) {
    let constraints = &doc.constraints;
    let listed = |list: &[String], license: &str| list.iter().any(|l| l.eq_ignore_ascii_case(license));
    for license in node.tags.iter().filter_map(|t| t.strip_prefix(LICENSE_TAG_PREFIX)) {
        if listed(&constraints.licenses_deny, license) {
            out.push(
                Diagnostic::warning(
                    DiagnosticCode::LicenseDenied,
                    format!("'{}' is licensed {license}, which is denied", node.id),
                )
                .on_node(node.id.clone()),
            );
        } else if !constraints.licenses_allow.is_empty()
            && !listed(&constraints.licenses_allow, license)
        {
            out.push(
                Diagnostic::warning(
                    DiagnosticCode::LicenseNotAllowed,
                    format!("'{}' is licensed {license}, which is not on the allow list", node.id),
                )
                .on_node(node.id.clone()),
            );
        }
    }
}

fn check_language_boundary(edge: &Edge, from: &Node, to: &Node, out: &mut Vec<Diagnostic>) {
    if from.kind == NodeKind::Adapter || to.kind == NodeKind::Adapter {
        return;
    }
    let (Some(a), Some(b)) = (&from.language, &to.language) else {
        return;
    };
    if ecosystem(a) != ecosystem(b) {
        out.push(
            Diagnostic::warning(
                DiagnosticCode::LanguageBoundary,
                format!("{edge} crosses from {a} to {b}; consider an adapter"),
            )
            .on_edge(edge.id.clone()),
        );
    }
}

fn check_test_ecosystem(edge: &Edge, from: &Node, to: &Node, out: &mut Vec<Diagnostic>) {
    for (test, other) in [(from, to), (to, from)] {
        if test.kind != NodeKind::Test || other.kind == NodeKind::Test {
            continue;
        }
        let Some(framework) = &test.framework_hint else {
            continue;
        };
        let (Some(test_eco), Some(language)) = (test_framework_ecosystem(framework), &other.language)
        else {
            continue;
        };
        if test_eco != ecosystem(language) {
            out.push(
                Diagnostic::warning(
                    DiagnosticCode::TestEcosystemMismatch,
                    format!(
                        "test '{}' uses {framework} but '{}' is written in {language}",
                        test.id, other.id
                    ),
                )
                .on_node(test.id.clone())
                .on_edge(edge.id.clone()),
            );
        }
    }
}

fn check_port_types(edge: &Edge, from: &Node, to: &Node, out: &mut Vec<Diagnostic>) {
    let produced = from
        .port(PortDirection::Output, &edge.from.port)
        .and_then(|p| p.port_type.as_ref());
    let consumed = to
        .port(PortDirection::Input, &edge.to.port)
        .and_then(|p| p.port_type.as_ref());
    let (Some(produced), Some(consumed)) = (produced, consumed) else {
        return;
    };
    let (a, b) = (canonical_json(produced), canonical_json(consumed));
    if a != b {
        out.push(
            Diagnostic::warning(
                DiagnosticCode::PortTypeMismatch,
                format!("{edge} carries {a} into a port expecting {b}"),
            )
            .on_edge(edge.id.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::{Endpoint, NewNode, Port};
    use serde_json::json;

    fn pair(from: NewNode, to: NewNode) -> RpgDocument {
        let mut doc = RpgDocument::new("compat");
        let a = doc.add_node(from.output(Port::new("out"))).unwrap();
        let b = doc.add_node(to.input(Port::new("in"))).unwrap();
        doc.add_edge(Endpoint::new(a, "out"), Endpoint::new(b, "in"), false, None)
            .unwrap();
        doc
    }

    fn codes(found: &[Diagnostic]) -> Vec<DiagnosticCode> {
        found.iter().map(|d| d.code).collect()
    }

    #[test]
    fn runtime_allow_list_is_enforced() {
        let mut doc = pair(
            NewNode::new("api", NodeKind::Module).language("python"),
            NewNode::new("core", NodeKind::Module).language("Rust"),
        );
        doc.constraints.runtime = vec!["rust".into()];
        let found = validate_compatibility(&doc, false).unwrap();
        let runtime: Vec<_> = found
            .iter()
            .filter(|d| d.code == DiagnosticCode::RuntimeNotAllowed)
            .collect();
        assert_eq!(runtime.len(), 1);
        assert_eq!(runtime[0].node.as_deref(), Some("api"));
    }

    #[test]
    fn runtime_aliases_match_their_language() {
        let mut doc = pair(
            NewNode::new("web", NodeKind::Module).language("typescript"),
            NewNode::new("cli", NodeKind::Module).language("JavaScript"),
        );
        for runtime in ["ts", "TypeScript", "node"] {
            doc.constraints.runtime = vec![runtime.into()];
            assert!(
                validate_compatibility(&doc, false).unwrap().is_empty(),
                "runtime {runtime} should admit both nodes"
            );
        }

        doc.constraints.runtime = vec!["py".into()];
        let found = codes(&validate_compatibility(&doc, false).unwrap());
        assert_eq!(found, vec![DiagnosticCode::RuntimeNotAllowed; 2]);
    }

    #[test]
    fn license_tags_are_checked() {
        let mut doc = pair(
            NewNode::new("a", NodeKind::Module).tag("license:GPL-3.0"),
            NewNode::new("b", NodeKind::Module).tag("license:BSD-2-Clause"),
        );
        doc.constraints.licenses_deny = vec!["gpl-3.0".into()];
        doc.constraints.licenses_allow = vec!["MIT".into()];
        let found = codes(&validate_compatibility(&doc, false).unwrap());
        assert_eq!(
            found,
            vec![DiagnosticCode::LicenseDenied, DiagnosticCode::LicenseNotAllowed]
        );
    }

    #[test]
    fn language_boundary_skips_adapters_and_same_ecosystem() {
        let doc = pair(
            NewNode::new("web", NodeKind::Module).language("typescript"),
            NewNode::new("svc", NodeKind::Module).language("javascript"),
        );
        assert!(validate_compatibility(&doc, false).unwrap().is_empty());

        let doc = pair(
            NewNode::new("web", NodeKind::Module).language("typescript"),
            NewNode::new("svc", NodeKind::Module).language("go"),
        );
        assert_eq!(
            codes(&validate_compatibility(&doc, false).unwrap()),
            vec![DiagnosticCode::LanguageBoundary]
        );

        let doc = pair(
            NewNode::new("web", NodeKind::Adapter).language("typescript"),
            NewNode::new("svc", NodeKind::Module).language("go"),
        );
        assert!(validate_compatibility(&doc, false).unwrap().is_empty());
    }

    #[test]
    fn test_framework_must_match_subject_language() {
        let mut test = NewNode::new("parser tests", NodeKind::Test);
        test.framework_hint = Some("jest".into());
        let doc = pair(NewNode::new("parser", NodeKind::Atom).language("python"), test);
        let found = validate_compatibility(&doc, false).unwrap();
        assert_eq!(codes(&found), vec![DiagnosticCode::TestEcosystemMismatch]);
        assert_eq!(found[0].node.as_deref(), Some("parser-tests"));
    }

    #[test]
    fn port_types_compare_canonically() {
        let mut doc = pair(
            NewNode::new("a", NodeKind::Atom),
            NewNode::new("b", NodeKind::Atom),
        );
        doc.set_port_type("a", PortDirection::Output, "out", Some(json!({"x": 1, "y": 2})))
            .unwrap();
        doc.set_port_type("b", PortDirection::Input, "in", Some(json!({"y": 2, "x": 1})))
            .unwrap();
        assert!(validate_compatibility(&doc, false).unwrap().is_empty());

        doc.set_port_type("b", PortDirection::Input, "in", Some(json!("bytes")))
            .unwrap();
        assert_eq!(
            codes(&validate_compatibility(&doc, false).unwrap()),
            vec![DiagnosticCode::PortTypeMismatch]
        );
    }

    #[test]
    fn strict_mode_refuses_any_warning() {
        let doc = pair(
            NewNode::new("web", NodeKind::Module).language("typescript"),
            NewNode::new("svc", NodeKind::Module).language("go"),
        );
        match validate_compatibility(&doc, true) {
            Err(CheckError::Incompatible { diagnostics }) => assert_eq!(diagnostics.len(), 1),
            other => panic!("expected Incompatible, got {other:?}"),
        }
    }
}
