//! Name-based dispatch: the entry point a transport wraps.
//!
//! [`RpgService::call`] takes an operation name and its JSON arguments and
//! returns the JSON result. Undecodable arguments are `SCHEMA_INVALID`.
//! [`RpgService::handle`] additionally folds failures into the
//! `{success, result | error}` envelope.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use rpg_storage::DocumentStore;

use crate::error::ApiError;
use crate::service::RpgService;

/// Every operation name `call` accepts, deprecated aliases last.
pub const OPERATIONS: &[&str] = &[
    "start_session",
    "get_ir",
    "set_constraints",
    "add_node",
    "update_node",
    "delete_node",
    "add_port",
    "remove_port",
    "add_edge",
    "remove_edge",
    "set_port_type",
    "set_contracts",
    "rename_port",
    "split_node",
    "merge_nodes",
    "insert_adapter",
    "patch_ir",
    "validate_graph",
    "get_validation_errors",
    "validate_compatibility",
    "score_ir",
    "canonicalize",
    "export_snapshot",
    "plan_file_layout",
    "emit_impl_batches",
    "get_rpg_view",
    "get_impl_view",
    "export_dot",
    "synthesize_file_layout",
    "build_impl_plan",
];

fn parse<T: DeserializeOwned>(op: &str, args: Value) -> Result<T, ApiError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ApiError::SchemaInvalid(format!("{op}: {e}")))
}

fn reply<T: Serialize>(value: T) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(value)?)
}

impl<S: DocumentStore> RpgService<S> {
    /// Runs operation `op` with `args`.
    #[allow(deprecated)]
    pub fn call(&self, op: &str, args: Value) -> Result<Value, ApiError> {
        debug!(op, "dispatching");
        match op {
            "start_session" => reply(self.start_session(parse(op, args)?)?),
            "get_ir" => reply(self.get_ir()?),
            "set_constraints" => reply(self.set_constraints(parse(op, args)?)?),
            "add_node" => reply(self.add_node(parse(op, args)?)?),
            "update_node" => reply(self.update_node(parse(op, args)?)?),
            "delete_node" => reply(self.delete_node(parse(op, args)?)?),
            "add_port" => reply(self.add_port(parse(op, args)?)?),
            "remove_port" => reply(self.remove_port(parse(op, args)?)?),
            "add_edge" => reply(self.add_edge(parse(op, args)?)?),
            "remove_edge" => reply(self.remove_edge(parse(op, args)?)?),
            "set_port_type" => reply(self.set_port_type(parse(op, args)?)?),
            "set_contracts" => reply(self.set_contracts(parse(op, args)?)?),
            "rename_port" => reply(self.rename_port(parse(op, args)?)?),
            "split_node" => reply(self.split_node(parse(op, args)?)?),
            "merge_nodes" => reply(self.merge_nodes(parse(op, args)?)?),
            "insert_adapter" => reply(self.insert_adapter(parse(op, args)?)?),
            "patch_ir" => reply(self.patch_ir(parse(op, args)?)?),
            "validate_graph" => reply(self.validate_graph()?),
            "get_validation_errors" => reply(self.get_validation_errors()?),
            "validate_compatibility" => reply(self.validate_compatibility(parse(op, args)?)?),
            "score_ir" => reply(self.score_ir()?),
            "canonicalize" => reply(self.canonicalize()?),
            "export_snapshot" => reply(self.export_snapshot(parse(op, args)?)?),
            "plan_file_layout" => reply(self.plan_file_layout(parse(op, args)?)?),
            "emit_impl_batches" => reply(self.emit_impl_batches(parse(op, args)?)?),
            "get_rpg_view" => reply(self.get_rpg_view()?),
            "get_impl_view" => reply(self.get_impl_view()?),
            "export_dot" => reply(self.export_dot()?),
            "synthesize_file_layout" => reply(self.synthesize_file_layout(parse(op, args)?)?),
            "build_impl_plan" => reply(self.build_impl_plan(parse(op, args)?)?),
            other => Err(ApiError::SchemaInvalid(format!(
                "unknown operation '{other}'"
            ))),
        }
    }

    /// Like [`RpgService::call`], but never fails: the outcome is wrapped in
    /// `{"success": true, "result": ...}` or `{"success": false, "error": ...}`.
    pub fn handle(&self, op: &str, args: Value) -> Value {
        match self.call(op, args) {
            Ok(result) => json!({ "success": true, "result": result }),
            Err(err) => {
                warn!(op, code = err.code(), error = %err, "operation failed");
                json!({ "success": false, "error": err.detail() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_storage::InMemoryStore;

    fn service() -> RpgService<InMemoryStore> {
        let service = RpgService::new(InMemoryStore::new());
        service.call("start_session", json!({"goal": "demo"})).unwrap();
        service
    }

    #[test]
    fn unknown_operation_is_schema_invalid() {
        let err = service().call("frobnicate", Value::Null).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_INVALID");
    }

    #[test]
    fn malformed_arguments_are_schema_invalid() {
        let err = service()
            .call("add_node", json!({"hint": "x", "kind": "gadget"}))
            .unwrap_err();
        assert_eq!(err.code(), "SCHEMA_INVALID");
    }

    #[test]
    fn handle_wraps_results_and_errors() {
        let service = service();
        let ok = service.handle("add_node", json!({"hint": "Api Gateway", "kind": "module"}));
        assert_eq!(ok["success"], true);
        assert_eq!(ok["result"]["result"]["id"], "api-gateway");
        assert_eq!(ok["result"]["rev"], 2);

        let failed = service.handle("delete_node", json!({"id": "missing"}));
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn deprecated_aliases_still_dispatch() {
        let service = service();
        service
            .call("add_node", json!({"hint": "solo", "kind": "atom"}))
            .unwrap();
        let layout = service.call("synthesize_file_layout", json!({})).unwrap();
        assert!(layout["result"]["files"]["solo"].is_object());
        let plan = service.call("build_impl_plan", Value::Null).unwrap();
        assert_eq!(plan["result"]["batches"][0]["items"][0]["node"], "solo");
    }

    #[test]
    fn every_listed_operation_is_known() {
        let service = service();
        for op in OPERATIONS {
            if let Err(err) = service.call(op, json!({})) {
                assert!(
                    !err.to_string().contains("unknown operation"),
                    "{op} is listed but not dispatched"
                );
            }
        }
    }
}
