//! RpgService: the single coordinator between callers and the
//! core/check/plan/storage crates.
//!
//! Every mutation follows the same path: load the persisted document, apply
//! the edit to a copy, drop derived caches, validate, and commit against the
//! revision that was loaded. Nothing reaches the store unless it validated.

use std::sync::{Mutex, MutexGuard};

use rpg_check::{score_ir, validate_compatibility, validate_graph, ScoreReport, ValidationReport};
use rpg_core::{apply_patch, canonical_value, AdapterOutcome, FileLayout, ImplPlan, MergeOutcome, RpgDocument};
use rpg_plan::{emit_impl_batches, plan_file_layout};
use rpg_storage::{content_hash, DocumentStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::idempotency::IdempotencyCache;
use crate::schema::mutations::*;
use crate::schema::planning::*;
use crate::schema::session::*;
use crate::schema::views::{DotExport, ImplView, RpgView};
use crate::schema::{Committed, MutationOptions};
use crate::views;

/// What a mutation does to the cached layout and plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Derived {
    /// The graph changed; cached views describe the old one.
    Clear,
    /// The operation maintains the caches itself.
    Keep,
}

/// The operation surface over one persisted document.
pub struct RpgService<S: DocumentStore> {
    store: S,
    idempotency: IdempotencyCache,
    last_report: Mutex<Option<ValidationReport>>,
}

impl<S: DocumentStore> RpgService<S> {
    pub fn new(store: S) -> Self {
        RpgService {
            store,
            idempotency: IdempotencyCache::new(),
            last_report: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn load(&self) -> Result<RpgDocument, ApiError> {
        Ok(self.store.load_required()?)
    }

    fn report_slot(&self) -> MutexGuard<'_, Option<ValidationReport>> {
        self.last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn validate_and_remember(&self, doc: &RpgDocument) -> ValidationReport {
        let report = validate_graph(doc);
        *self.report_slot() = Some(report.clone());
        report
    }

    /// Runs `run` once per idempotency key; repeats, including concurrent
    /// ones, get the first response.
    fn idempotent<R, F>(&self, op: &str, key: Option<&str>, run: F) -> Result<R, ApiError>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R, ApiError>,
    {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => self.idempotency.once(op, key, run),
            None => run(),
        }
    }

    fn mutate<R, F>(
        &self,
        op: &str,
        options: &MutationOptions,
        apply: F,
    ) -> Result<Committed<R>, ApiError>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce(&mut RpgDocument) -> Result<R, ApiError>,
    {
        self.mutate_keyed(op, options.request_id.as_deref(), options, Derived::Clear, apply)
    }

    fn mutate_keyed<R, F>(
        &self,
        op: &str,
        key: Option<&str>,
        options: &MutationOptions,
        derived: Derived,
        apply: F,
    ) -> Result<Committed<R>, ApiError>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce(&mut RpgDocument) -> Result<R, ApiError>,
    {
        self.idempotent(op, key, || {
            let current = self.load()?;
            if let Some(expected) = options.expected_rev {
                if expected != current.rev {
                    warn!(op, expected, actual = current.rev, "stale expectedRev");
                    return Err(ApiError::StaleRev {
                        expected,
                        actual: current.rev,
                    });
                }
            }

            let mut next = current.clone();
            let result = apply(&mut next).inspect_err(|e| {
                warn!(op, code = e.code(), error = %e, "mutation rejected");
            })?;
            if derived == Derived::Clear {
                next.clear_derived();
            }

            let report = self.validate_and_remember(&next);
            if !report.is_valid() {
                warn!(op, errors = report.errors.len(), "mutation failed validation");
                return Err(ApiError::ValidationFailed(report.errors));
            }

            let rev = self.store.commit(&next, current.rev)?;
            info!(op, rev, "mutation committed");
            Ok(Committed {
                rev,
                result,
                warnings: report.warnings,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Session and document
    // -----------------------------------------------------------------------

    /// Creates the document at rev 1, or returns the existing one unless
    /// `reset` is set.
    pub fn start_session(&self, request: StartSessionRequest) -> Result<SessionResponse, ApiError> {
        let key = request.options.request_id.clone();
        self.idempotent("start_session", key.as_deref(), || {
            let existing = self.store.load()?;
            if let Some(doc) = existing.as_ref().filter(|_| !request.reset) {
                return Ok(SessionResponse {
                    rev: doc.rev,
                    created: false,
                    document: doc.clone(),
                });
            }

            let expected = existing.map_or(0, |doc| doc.rev);
            let mut doc = RpgDocument::new(request.goal.clone());
            doc.capabilities = request.capabilities.clone();
            doc.io_boundaries = request.io_boundaries.clone();
            doc.constraints = request.constraints.clone();
            self.validate_and_remember(&doc);

            doc.rev = self.store.commit(&doc, expected)?;
            info!(rev = doc.rev, reset = request.reset, "session started");
            Ok(SessionResponse {
                rev: doc.rev,
                created: true,
                document: doc,
            })
        })
    }

    pub fn get_ir(&self) -> Result<RpgDocument, ApiError> {
        self.load()
    }

    pub fn set_constraints(
        &self,
        request: SetConstraintsRequest,
    ) -> Result<Committed<()>, ApiError> {
        self.mutate("set_constraints", &request.options, |doc| {
            if let Some(constraints) = request.constraints {
                doc.constraints = constraints;
            }
            if let Some(goal) = request.goal {
                doc.goal = goal;
            }
            if let Some(capabilities) = request.capabilities {
                doc.capabilities = capabilities;
            }
            if let Some(io_boundaries) = request.io_boundaries {
                doc.io_boundaries = io_boundaries;
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Nodes and ports
    // -----------------------------------------------------------------------

    pub fn add_node(&self, request: AddNodeRequest) -> Result<Committed<NodeRef>, ApiError> {
        self.mutate("add_node", &request.options, |doc| {
            Ok(NodeRef {
                id: doc.add_node(request.node)?,
            })
        })
    }

    pub fn update_node(&self, request: UpdateNodeRequest) -> Result<Committed<NodeRef>, ApiError> {
        self.mutate("update_node", &request.options, |doc| {
            doc.update_node(&request.id, request.update)?;
            Ok(NodeRef { id: request.id })
        })
    }

    pub fn delete_node(
        &self,
        request: DeleteNodeRequest,
    ) -> Result<Committed<DeletedNode>, ApiError> {
        self.mutate("delete_node", &request.options, |doc| {
            let removed = doc.delete_node(&request.id, request.force)?;
            Ok(DeletedNode {
                id: request.id,
                removed_edges: removed.into_iter().map(|e| e.id).collect(),
            })
        })
    }

    pub fn add_port(&self, request: AddPortRequest) -> Result<Committed<()>, ApiError> {
        self.mutate("add_port", &request.options, |doc| {
            Ok(doc.add_port(&request.node, request.direction, request.port)?)
        })
    }

    pub fn remove_port(&self, request: RemovePortRequest) -> Result<Committed<()>, ApiError> {
        self.mutate("remove_port", &request.options, |doc| {
            doc.remove_port(&request.node, request.direction, &request.name)?;
            Ok(())
        })
    }

    pub fn set_port_type(&self, request: SetPortTypeRequest) -> Result<Committed<()>, ApiError> {
        self.mutate("set_port_type", &request.options, |doc| {
            Ok(doc.set_port_type(
                &request.node,
                request.direction,
                &request.name,
                request.port_type,
            )?)
        })
    }

    pub fn set_contracts(&self, request: SetContractsRequest) -> Result<Committed<()>, ApiError> {
        self.mutate("set_contracts", &request.options, |doc| {
            Ok(doc.set_contracts(&request.node, request.contracts)?)
        })
    }

    pub fn rename_port(
        &self,
        request: RenamePortRequest,
    ) -> Result<Committed<RenamedPort>, ApiError> {
        self.mutate("rename_port", &request.options, |doc| {
            let rewritten_edges =
                doc.rename_port(&request.node, request.direction, &request.old, &request.new)?;
            Ok(RenamedPort {
                node: request.node,
                name: request.new,
                rewritten_edges,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Connects two ports. A caller-supplied `edgeId` also serves as the
    /// idempotency key when no `requestId` is given.
    pub fn add_edge(&self, request: AddEdgeRequest) -> Result<Committed<EdgeRef>, ApiError> {
        let key = request
            .options
            .request_id
            .clone()
            .or_else(|| request.edge_id.clone());
        self.mutate_keyed(
            "add_edge",
            key.as_deref(),
            &request.options,
            Derived::Clear,
            |doc| {
                let id = doc.add_edge(
                    request.from,
                    request.to,
                    request.order_before,
                    request.edge_id,
                )?;
                Ok(EdgeRef { id })
            },
        )
    }

    pub fn remove_edge(&self, request: RemoveEdgeRequest) -> Result<Committed<EdgeRef>, ApiError> {
        self.mutate("remove_edge", &request.options, |doc| {
            let removed = match (request.edge_id, request.from, request.to) {
                (Some(id), _, _) => doc.remove_edge_by_id(&id)?,
                (None, Some(from), Some(to)) => doc.remove_edge(&from, &to)?,
                _ => {
                    return Err(ApiError::SchemaInvalid(
                        "remove_edge needs edgeId or both from and to".to_string(),
                    ))
                }
            };
            Ok(EdgeRef { id: removed.id })
        })
    }

    // -----------------------------------------------------------------------
    // Restructuring
    // -----------------------------------------------------------------------

    pub fn split_node(&self, request: SplitNodeRequest) -> Result<Committed<SplitResult>, ApiError> {
        self.mutate("split_node", &request.options, |doc| {
            Ok(SplitResult {
                nodes: doc.split_node(&request.node, request.parts)?,
            })
        })
    }

    pub fn merge_nodes(
        &self,
        request: MergeNodesRequest,
    ) -> Result<Committed<MergeOutcome>, ApiError> {
        self.mutate("merge_nodes", &request.options, |doc| {
            Ok(doc.merge_nodes(request.merge)?)
        })
    }

    pub fn insert_adapter(
        &self,
        request: InsertAdapterRequest,
    ) -> Result<Committed<AdapterOutcome>, ApiError> {
        self.mutate("insert_adapter", &request.options, |doc| {
            Ok(doc.insert_adapter(request.adapter)?)
        })
    }

    /// Applies the whole batch to a candidate document; any failure, during
    /// application or validation, rejects all of it.
    pub fn patch_ir(&self, request: PatchRequest) -> Result<Committed<PatchResult>, ApiError> {
        self.mutate("patch_ir", &request.options, |doc| {
            *doc = apply_patch(doc, &request.ops)?;
            Ok(PatchResult {
                applied: request.ops.len(),
            })
        })
    }

    // -----------------------------------------------------------------------
    // Validation and analysis
    // -----------------------------------------------------------------------

    pub fn validate_graph(&self) -> Result<ValidationReport, ApiError> {
        let doc = self.load()?;
        Ok(self.validate_and_remember(&doc))
    }

    /// The report of the most recent validation, computing one if none ran
    /// in this process yet.
    pub fn get_validation_errors(&self) -> Result<ValidationReport, ApiError> {
        if let Some(report) = self.report_slot().clone() {
            return Ok(report);
        }
        self.validate_graph()
    }

    pub fn validate_compatibility(
        &self,
        request: CompatibilityRequest,
    ) -> Result<CompatibilityResponse, ApiError> {
        let warnings = validate_compatibility(&self.load()?, request.strict)?;
        Ok(CompatibilityResponse {
            compatible: warnings.is_empty(),
            warnings,
        })
    }

    pub fn score_ir(&self) -> Result<ScoreReport, ApiError> {
        Ok(score_ir(&self.load()?)?)
    }

    // -----------------------------------------------------------------------
    // Canonical form and export
    // -----------------------------------------------------------------------

    /// The canonical form and content hash. The stored document is not
    /// rewritten.
    pub fn canonicalize(&self) -> Result<CanonicalResponse, ApiError> {
        let doc = self.load()?;
        Ok(CanonicalResponse {
            hash: content_hash(&doc)?,
            document: canonical_value(&doc)?,
        })
    }

    pub fn export_snapshot(&self, request: ExportSnapshotRequest) -> Result<Snapshot, ApiError> {
        let doc = self.load()?;
        let document = if request.canonical {
            canonical_value(&doc)?
        } else {
            serde_json::to_value(&doc)?
        };
        Ok(Snapshot {
            rev: doc.rev,
            hash: content_hash(&doc)?,
            canonical: request.canonical,
            document,
        })
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Plans and persists the file layout. The batch plan is dropped since
    /// it embeds file paths.
    pub fn plan_file_layout(
        &self,
        request: PlanLayoutRequest,
    ) -> Result<Committed<FileLayout>, ApiError> {
        let key = request.options.request_id.clone();
        self.mutate_keyed(
            "plan_file_layout",
            key.as_deref(),
            &request.options,
            Derived::Keep,
            |doc| {
                let layout = plan_file_layout(doc, &request.layout)?;
                doc.file_layout = Some(layout.clone());
                doc.impl_plan_preview = None;
                Ok(layout)
            },
        )
    }

    #[deprecated(note = "use plan_file_layout")]
    pub fn synthesize_file_layout(
        &self,
        request: PlanLayoutRequest,
    ) -> Result<Committed<FileLayout>, ApiError> {
        warn!("synthesize_file_layout is deprecated; use plan_file_layout");
        self.plan_file_layout(request)
    }

    /// Emits and persists the implementation batches.
    pub fn emit_impl_batches(
        &self,
        request: EmitBatchesRequest,
    ) -> Result<Committed<ImplPlan>, ApiError> {
        let key = request.options.request_id.clone();
        self.mutate_keyed(
            "emit_impl_batches",
            key.as_deref(),
            &request.options,
            Derived::Keep,
            |doc| {
                let plan = emit_impl_batches(doc)?;
                doc.impl_plan_preview = Some(plan.clone());
                Ok(plan)
            },
        )
    }

    #[deprecated(note = "use emit_impl_batches")]
    pub fn build_impl_plan(
        &self,
        request: EmitBatchesRequest,
    ) -> Result<Committed<ImplPlan>, ApiError> {
        warn!("build_impl_plan is deprecated; use emit_impl_batches");
        self.emit_impl_batches(request)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn get_rpg_view(&self) -> Result<RpgView, ApiError> {
        Ok(views::rpg_view(&self.load()?))
    }

    pub fn get_impl_view(&self) -> Result<ImplView, ApiError> {
        Ok(views::impl_view(&self.load()?))
    }

    pub fn export_dot(&self) -> Result<DotExport, ApiError> {
        Ok(DotExport {
            dot: views::export_dot(&self.load()?),
        })
    }
}
