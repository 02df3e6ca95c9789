//! Batch JSON-patch editing of a whole document.
//!
//! A patch is a list of `add` / `remove` / `replace` operations addressed by
//! RFC 6901 pointers into the document's JSON form. The batch is applied to a
//! scratch JSON value and decoded back into an [`RpgDocument`]; the input
//! document is never touched, so a failure anywhere leaves nothing applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::RpgDocument;
use crate::error::CoreError;

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => {
                path
            }
        }
    }
}

/// Applies `ops` in order and returns the patched document.
///
/// The revision counter is owned by the store; paths under `/rev` are
/// refused.
pub fn apply_patch(doc: &RpgDocument, ops: &[PatchOp]) -> Result<RpgDocument, CoreError> {
    let mut value = serde_json::to_value(doc)?;

    for (index, op) in ops.iter().enumerate() {
        let fail = |reason: String| CoreError::InvalidPatch { index, reason };
        let tokens = parse_pointer(op.path()).map_err(fail)?;
        if tokens.first().map(String::as_str) == Some("rev") {
            return Err(fail("the revision counter cannot be patched".to_string()));
        }
        let (last, parents) = tokens
            .split_last()
            .ok_or_else(|| fail("the document root cannot be patched".to_string()))?;
        let parent = walk(&mut value, parents).map_err(fail)?;
        let applied = match op {
            PatchOp::Add { value: new, .. } => add(parent, last, new.clone()),
            PatchOp::Remove { .. } => remove(parent, last),
            PatchOp::Replace { value: new, .. } => replace(parent, last, new.clone()),
        };
        applied.map_err(fail)?;
    }

    let mut patched: RpgDocument =
        serde_json::from_value(value).map_err(|e| CoreError::InvalidPatch {
            index: ops.len(),
            reason: format!("patched document does not decode: {e}"),
        })?;
    patched.rev = doc.rev;
    Ok(patched)
}

/// Splits an RFC 6901 pointer into unescaped reference tokens.
fn parse_pointer(path: &str) -> Result<Vec<String>, String> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| format!("pointer '{path}' must start with '/'"))?;
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn array_index(token: &str, len: usize, allow_end: bool) -> Result<usize, String> {
    if allow_end && token == "-" {
        return Ok(len);
    }
    if token.len() > 1 && token.starts_with('0') {
        return Err(format!("array index '{token}' has a leading zero"));
    }
    let index: usize = token
        .parse()
        .map_err(|_| format!("'{token}' is not an array index"))?;
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    if index > limit || (!allow_end && len == 0) {
        return Err(format!("array index {index} out of bounds (len {len})"));
    }
    Ok(index)
}

fn walk<'v>(mut value: &'v mut Value, tokens: &[String]) -> Result<&'v mut Value, String> {
    for token in tokens {
        value = match value {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| format!("no member '{token}'"))?,
            Value::Array(items) => {
                let index = array_index(token, items.len(), false)?;
                &mut items[index]
            }
            _ => return Err(format!("cannot descend into a scalar at '{token}'")),
        };
    }
    Ok(value)
}

fn add(parent: &mut Value, token: &str, new: Value) -> Result<(), String> {
    match parent {
        Value::Object(map) => {
            map.insert(token.to_string(), new);
            Ok(())
        }
        Value::Array(items) => {
            let index = array_index(token, items.len(), true)?;
            items.insert(index, new);
            Ok(())
        }
        _ => Err(format!("cannot add '{token}' to a scalar")),
    }
}

fn remove(parent: &mut Value, token: &str) -> Result<(), String> {
    match parent {
        Value::Object(map) => map
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| format!("no member '{token}' to remove")),
        Value::Array(items) => {
            let index = array_index(token, items.len(), false)?;
            items.remove(index);
            Ok(())
        }
        _ => Err(format!("cannot remove '{token}' from a scalar")),
    }
}

fn replace(parent: &mut Value, token: &str, new: Value) -> Result<(), String> {
    let slot = match parent {
        Value::Object(map) => map
            .get_mut(token)
            .ok_or_else(|| format!("no member '{token}' to replace"))?,
        Value::Array(items) => {
            let index = array_index(token, items.len(), false)?;
            &mut items[index]
        }
        _ => return Err(format!("cannot replace '{token}' in a scalar")),
    };
    *slot = new;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};
    use serde_json::json;

    fn doc() -> RpgDocument {
        let mut doc = RpgDocument::new("patch me");
        doc.nodes
            .insert("a".into(), Node::new("a", NodeKind::Module, "first"));
        doc.rev = 7;
        doc
    }

    fn ops(value: Value) -> Vec<PatchOp> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn replace_and_add_apply_in_order() {
        let patched = apply_patch(
            &doc(),
            &ops(json!([
                {"op": "replace", "path": "/goal", "value": "new goal"},
                {"op": "add", "path": "/constraints/runtime/-", "value": "rust"},
                {"op": "replace", "path": "/nodes/a/summary", "value": "renamed"}
            ])),
        )
        .unwrap();
        assert_eq!(patched.goal, "new goal");
        assert_eq!(patched.constraints.runtime, vec!["rust"]);
        assert_eq!(patched.nodes["a"].summary, "renamed");
        assert_eq!(patched.rev, 7);
    }

    #[test]
    fn escaped_pointer_tokens_are_unescaped() {
        assert_eq!(parse_pointer("/a~1b/c~0d").unwrap(), vec!["a/b", "c~d"]);
    }

    #[test]
    fn failing_op_rejects_the_batch() {
        let original = doc();
        let err = apply_patch(
            &original,
            &ops(json!([
                {"op": "replace", "path": "/goal", "value": "changed"},
                {"op": "remove", "path": "/nodes/missing"}
            ])),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch { index: 1, .. }));
        assert_eq!(original.goal, "patch me");
    }

    #[test]
    fn rev_is_not_patchable() {
        let err = apply_patch(
            &doc(),
            &ops(json!([{"op": "replace", "path": "/rev", "value": 99}])),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch { index: 0, .. }));
    }

    #[test]
    fn undecodable_result_is_rejected() {
        let err = apply_patch(
            &doc(),
            &ops(json!([{"op": "replace", "path": "/nodes/a/kind", "value": "spaceship"}])),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch { index: 1, .. }));
    }

    #[test]
    fn array_bounds_are_checked() {
        let err = apply_patch(
            &doc(),
            &ops(json!([{"op": "remove", "path": "/edges/0"}])),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch { .. }));
    }
}
