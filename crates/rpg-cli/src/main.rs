//! Planning-graph CLI.
//!
//! Provides the `rpg` binary, the hosting process for one planning
//! document. Each subcommand is a thin wrapper over an `RpgService`
//! operation; `call` reaches every operation by name with JSON arguments.
//!
//! The document path comes from `--doc`, then `RPG_DOC_PATH`, then
//! `rpg.json` in the working directory. Logs go to stderr (`RUST_LOG`),
//! results to stdout as JSON.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use rpg_service::{ApiError, RpgService, OPERATIONS};
use rpg_storage::{FileStore, StoreConfig};

const DOC_PATH_ENV: &str = "RPG_DOC_PATH";
const DEFAULT_DOC_PATH: &str = "rpg.json";

/// Plan software architectures as a typed graph.
#[derive(Parser)]
#[command(name = "rpg", about = "Resource planning graph tools")]
struct Cli {
    /// Path to the planning document (default: $RPG_DOC_PATH or rpg.json).
    #[arg(short, long, global = true)]
    doc: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create the document, or show the existing one.
    Init {
        /// What the planned system is for.
        #[arg(short, long, default_value = "")]
        goal: String,

        /// Replace an existing document.
        #[arg(long)]
        reset: bool,
    },

    /// Print the current document.
    Show,

    /// Validate the graph; exits 1 when there are hard errors.
    Validate,

    /// Check runtime, license and cross-node compatibility.
    Check {
        /// Fail on any finding.
        #[arg(long)]
        strict: bool,
    },

    /// Print the advisory quality score.
    Score,

    /// Print the canonical form and content hash.
    Canonical,

    /// Print only the content hash.
    Hash,

    /// Plan and persist the file layout.
    Layout {
        /// Language convention, or `auto` to infer per node.
        #[arg(short, long, default_value = "auto")]
        policy: String,

        /// `dedicated` or `co-located`.
        #[arg(short, long, default_value = "dedicated")]
        test_layout: String,

        /// Folder override as ROLE=FOLDER; repeatable.
        #[arg(short, long = "role", value_name = "ROLE=FOLDER")]
        roles: Vec<String>,
    },

    /// Emit and persist implementation batches.
    Batches,

    /// Print the graph as Graphviz DOT.
    Dot,

    /// Invoke any operation by name with JSON arguments.
    Call {
        /// Operation name; `rpg call list` prints them all.
        op: String,

        /// JSON arguments (default: {}).
        args: Option<String>,
    },
}

/// How a successful result is printed.
enum Output {
    Json,
    Field(&'static str),
    Raw(&'static str),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli
        .doc
        .or_else(|| std::env::var_os(DOC_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOC_PATH));
    tracing::debug!(path = %path.display(), "using planning document");

    let exit_code = match plan_call(cli.command) {
        Ok(Some((op, args, output))) => {
            let service = RpgService::new(FileStore::new(StoreConfig::from_env(&path)));
            run(&service, op, args, output)
        }
        Ok(None) => {
            for op in OPERATIONS {
                println!("{op}");
            }
            0
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            2
        }
    };
    process::exit(exit_code);
}

/// An operation name, its arguments, and how to print the result.
type PlannedCall = (String, Value, Output);

/// Maps a subcommand to an operation call. `None` lists the operations.
fn plan_call(command: Commands) -> Result<Option<PlannedCall>, String> {
    let call = |op: &str, args: Value, output: Output| -> Result<Option<PlannedCall>, String> {
        Ok(Some((op.to_string(), args, output)))
    };
    match command {
        Commands::Init { goal, reset } => call(
            "start_session",
            json!({ "goal": goal, "reset": reset }),
            Output::Json,
        ),
        Commands::Show => call("get_ir", json!({}), Output::Json),
        Commands::Validate => call("validate_graph", json!({}), Output::Json),
        Commands::Check { strict } => call(
            "validate_compatibility",
            json!({ "strict": strict }),
            Output::Json,
        ),
        Commands::Score => call("score_ir", json!({}), Output::Json),
        Commands::Canonical => call("canonicalize", json!({}), Output::Json),
        Commands::Hash => call("canonicalize", json!({}), Output::Field("hash")),
        Commands::Layout {
            policy,
            test_layout,
            roles,
        } => {
            let mut role_to_folder = serde_json::Map::new();
            for role in roles {
                let (key, folder) = role
                    .split_once('=')
                    .ok_or_else(|| format!("--role expects ROLE=FOLDER, got '{role}'"))?;
                role_to_folder.insert(key.to_string(), Value::String(folder.to_string()));
            }
            call(
                "plan_file_layout",
                json!({
                    "policy": policy,
                    "testLayout": test_layout,
                    "roleToFolder": role_to_folder,
                }),
                Output::Json,
            )
        }
        Commands::Batches => call("emit_impl_batches", json!({}), Output::Json),
        Commands::Dot => call("export_dot", json!({}), Output::Raw("dot")),
        Commands::Call { op, .. } if op == "list" => Ok(None),
        Commands::Call { op, args } => {
            let args = match args {
                Some(text) => serde_json::from_str(&text)
                    .map_err(|e| format!("arguments are not valid JSON: {e}"))?,
                None => json!({}),
            };
            call(&op, args, Output::Json)
        }
    }
}

/// Runs one operation and prints its outcome.
///
/// Returns exit code: 0 = success, 1 = operation refused (or the graph has
/// validation errors), 3 = I/O or internal error.
fn run(service: &RpgService<FileStore>, op: String, args: Value, output: Output) -> i32 {
    let result = match service.call(&op, args) {
        Ok(result) => result,
        Err(err) => return report_error(&err),
    };

    match output {
        Output::Json => print_json(&result),
        Output::Field(name) => print_json(&result[name]),
        Output::Raw(name) => print!("{}", result[name].as_str().unwrap_or_default()),
    }

    let invalid = op == "validate_graph"
        && result["errors"].as_array().is_some_and(|errors| !errors.is_empty());
    if invalid {
        1
    } else {
        0
    }
}

fn print_json(value: &Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

fn report_error(err: &ApiError) -> i32 {
    let detail = serde_json::to_string_pretty(&err.detail())
        .unwrap_or_else(|_| format!("{{\"code\": \"{}\"}}", err.code()));
    eprintln!("{}", detail);
    match err {
        ApiError::InternalError(_) => 3,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(args: &[&str]) -> Result<Option<PlannedCall>, String> {
        let cli = Cli::try_parse_from(std::iter::once("rpg").chain(args.iter().copied()))
            .map_err(|e| e.to_string())?;
        plan_call(cli.command)
    }

    #[test]
    fn layout_roles_become_overrides() {
        let (op, args, _) = planned(&["layout", "--role", "infra=deploy", "-t", "co-located"])
            .unwrap()
            .unwrap();
        assert_eq!(op, "plan_file_layout");
        assert_eq!(args["roleToFolder"]["infra"], "deploy");
        assert_eq!(args["testLayout"], "co-located");
    }

    #[test]
    fn malformed_role_is_rejected() {
        assert!(planned(&["layout", "--role", "infra"]).is_err());
    }

    #[test]
    fn call_parses_json_arguments() {
        let (op, args, _) = planned(&["call", "add_node", r#"{"hint":"a","kind":"atom"}"#])
            .unwrap()
            .unwrap();
        assert_eq!(op, "add_node");
        assert_eq!(args["kind"], "atom");
        assert!(planned(&["call", "add_node", "{oops"]).is_err());
        assert!(planned(&["call", "list"]).unwrap().is_none());
    }
}
