//! Canonical form of a document and its deterministic JSON rendering.
//!
//! The canonical form fixes every ordering the document model leaves free:
//! nodes by id, ports by name, edges by endpoints, constraint lists sorted
//! and de-duplicated. Rendering then writes compact JSON with object keys
//! sorted at every depth, so opaque port types compare and hash the same
//! regardless of how they were written. Both steps are idempotent.

use serde_json::Value;

use crate::document::RpgDocument;
use crate::error::CoreError;

/// Top-level keys that are bookkeeping rather than content; excluded from the
/// hash scope.
pub const NON_CONTENT_KEYS: [&str; 3] = ["rev", "fileLayout", "implPlanPreview"];

/// Returns the canonical form of `doc`.
pub fn canonicalize(doc: &RpgDocument) -> RpgDocument {
    let mut canon = doc.clone();

    canon.nodes.sort_keys();
    for node in canon.nodes.values_mut() {
        node.inputs.sort_by(|a, b| a.name.cmp(&b.name));
        node.outputs.sort_by(|a, b| a.name.cmp(&b.name));
    }
    canon.edges.sort_by(|a, b| a.canonical_cmp(b));

    for list in [
        &mut canon.constraints.runtime,
        &mut canon.constraints.licenses_allow,
        &mut canon.constraints.licenses_deny,
    ] {
        list.sort();
        list.dedup();
    }
    canon
}

/// The canonical form as a JSON value.
pub fn canonical_value(doc: &RpgDocument) -> Result<Value, CoreError> {
    Ok(serde_json::to_value(canonicalize(doc))?)
}

/// The part of the canonical form a content hash covers.
pub fn content_value(doc: &RpgDocument) -> Result<Value, CoreError> {
    let mut value = canonical_value(doc)?;
    if let Value::Object(map) = &mut value {
        for key in NON_CONTENT_KEYS {
            map.remove(key);
        }
    }
    Ok(value)
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
