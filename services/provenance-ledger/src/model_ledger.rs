//! Models, training runs and inference commitments.
//!
//! A model snapshots its dataset root at creation; later dataset versions never
//! touch it. Anchoring a mirror record into the dataset registry is the only
//! nested call whose failure is absorbed: the model stays created and the
//! outcome is reported as an event.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use provenance_core::{compute_dataset_id, derive_model_id, merkle, metrics, Account, Digest, LedgerError, LedgerResult, Timestamp};
use provenance_resilience::{AttemptChain, ChainOutcome};

use crate::admin::AdminControl;
use crate::context::CallContext;
use crate::events::{EventLog, LedgerEvent};
use crate::journal::{Journal, Transactional};
use crate::observe;
use crate::registry::{DatasetRegistry, ModelDirectory, ModelRecordRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub owner: Account,
    pub dataset_id: Digest,
    pub dataset_version: u64,
    pub dataset_root: Digest,
    pub code_hash: Digest,
    pub arch_hash: Digest,
    pub model_uri: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Started,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub weights_hash: Digest,
    pub metrics_hash: Digest,
    pub artifacts_ref: String,
    pub finalized_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub model_id: Digest,
    pub config_hash: Digest,
    pub started_at: Timestamp,
    /// Set exactly once, by finalization.
    pub result: Option<RunResult>,
}

impl TrainingRun {
    pub fn state(&self) -> RunState {
        if self.result.is_some() { RunState::Finalized } else { RunState::Started }
    }

    pub fn is_finalized(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateModelRequest {
    /// Derived from caller, dataset, chain, time and a counter when absent.
    pub model_id: Option<Digest>,
    pub dataset_id: Digest,
    pub dataset_version: u64,
    pub code_hash: Digest,
    pub arch_hash: Digest,
    pub model_uri: String,
    pub initial_config_hash: Digest,
    pub also_anchor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorOutcome {
    pub success: bool,
    /// Which registration path succeeded, if any.
    pub tier: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCreated {
    pub model_id: Digest,
    pub dataset_root: Digest,
    pub anchoring: Option<AnchorOutcome>,
}

pub const ANCHOR_TIER_OPERATOR: &str = "operator";
pub const ANCHOR_TIER_LEGACY: &str = "legacy";

#[derive(Debug, Clone)]
enum ModelUndo {
    Admin(AdminControl),
    ModelInserted(Digest),
    Operator { key: (Digest, Account), was: bool },
    RunStarted(u64),
    RunFinalized(u64),
}

#[derive(Debug, Clone)]
pub struct ModelProvenanceLedger {
    address: Account,
    admin: AdminControl,
    models: HashMap<Digest, Model>,
    runs: BTreeMap<u64, TrainingRun>,
    next_run_id: u64,
    creation_nonce: u64,
    operators: HashSet<(Digest, Account)>,
    events: EventLog,
    journal: Journal<ModelUndo>,
}

impl ModelProvenanceLedger {
    pub fn new(address: Account, owner: Account) -> Self {
        Self {
            address,
            admin: AdminControl::new(owner),
            models: HashMap::new(),
            runs: BTreeMap::new(),
            next_run_id: 1,
            creation_nonce: 0,
            operators: HashSet::new(),
            events: EventLog::default(),
            journal: Journal::default(),
        }
    }

    pub fn address(&self) -> Account {
        self.address
    }

    pub fn owner(&self) -> Account {
        self.admin.owner()
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Account) -> LedgerResult<()> {
        observe("model.transfer_ownership", || {
            let before = self.admin.clone();
            let previous = self.admin.transfer_ownership(&ctx.caller, new_owner)?;
            self.journal.record(ModelUndo::Admin(before));
            self.events.emit(LedgerEvent::OwnershipTransferred { previous, new_owner });
            Ok(())
        })
    }

    pub fn set_paused(&mut self, ctx: &CallContext, paused: bool) -> LedgerResult<()> {
        observe("model.set_paused", || {
            let before = self.admin.clone();
            self.admin.set_paused(&ctx.caller, paused)?;
            self.journal.record(ModelUndo::Admin(before));
            self.events.emit(LedgerEvent::PauseChanged { by: ctx.caller, paused });
            Ok(())
        })
    }

    fn model_owned_by(&self, model_id: &Digest, caller: &Account) -> LedgerResult<&Model> {
        let model = self.models.get(model_id).ok_or(LedgerError::ModelNotFound(*model_id))?;
        if model.owner != *caller {
            return Err(LedgerError::NotModelOwner { caller: *caller, model_id: *model_id });
        }
        Ok(model)
    }

    // --- models ---

    pub fn create_model(&mut self, registry: &mut dyn DatasetRegistry, ctx: &CallContext, req: CreateModelRequest) -> LedgerResult<ModelCreated> {
        observe("model.create_model", || {
            self.admin.ensure_active()?;
            let dataset_root = resolve_dataset_root(registry, &req.dataset_id, req.dataset_version)?;
            let model_id = match req.model_id {
                Some(id) if id.is_zero() => return Err(LedgerError::ZeroValue("model_id")),
                Some(id) => id,
                None => derive_model_id(&ctx.caller, &req.dataset_id, req.dataset_version, ctx.chain_id, ctx.now, self.creation_nonce),
            };
            if self.models.contains_key(&model_id) {
                return Err(LedgerError::ModelExists(model_id));
            }

            self.creation_nonce += 1;
            self.models.insert(
                model_id,
                Model {
                    owner: ctx.caller,
                    dataset_id: req.dataset_id,
                    dataset_version: req.dataset_version,
                    dataset_root,
                    code_hash: req.code_hash,
                    arch_hash: req.arch_hash,
                    model_uri: req.model_uri.clone(),
                    created_at: ctx.now,
                },
            );
            self.journal.record(ModelUndo::ModelInserted(model_id));
            info!(%model_id, owner = %ctx.caller, dataset_id = %req.dataset_id, dataset_version = req.dataset_version, "model created");
            self.events.emit(LedgerEvent::ModelCreated {
                model_id,
                owner: ctx.caller,
                dataset_id: req.dataset_id,
                dataset_version: req.dataset_version,
                dataset_root,
                code_hash: req.code_hash,
                arch_hash: req.arch_hash,
                model_uri: req.model_uri.clone(),
                initial_config_hash: req.initial_config_hash,
            });

            let anchoring = req.also_anchor.then(|| self.anchor(registry, ctx, model_id, &req));
            Ok(ModelCreated { model_id, dataset_root, anchoring })
        })
    }

    /// Resolves `dataset_name` to its id and delegates to [`create_model`](Self::create_model).
    pub fn create_model_by_name(
        &mut self,
        registry: &mut dyn DatasetRegistry,
        ctx: &CallContext,
        dataset_name: &str,
        mut req: CreateModelRequest,
    ) -> LedgerResult<ModelCreated> {
        req.dataset_id = compute_dataset_id(dataset_name);
        self.create_model(registry, ctx, req)
    }

    // Operator-aware registration first, then the legacy call. The registry
    // sees this ledger as the caller. Failure never unwinds the model.
    fn anchor(&mut self, registry: &mut dyn DatasetRegistry, ctx: &CallContext, model_id: Digest, req: &CreateModelRequest) -> AnchorOutcome {
        let anchor_ctx = ctx.as_caller(self.address);
        let owner = ctx.caller;
        let record = ModelRecordRequest {
            model_id,
            dataset_id: req.dataset_id,
            dataset_version: req.dataset_version,
            training_config_hash: req.initial_config_hash,
        };
        let outcome = AttemptChain::<dyn DatasetRegistry + '_, (), LedgerError>::new("anchor_model")
            .then(ANCHOR_TIER_OPERATOR, move |r| r.register_model_operator(&anchor_ctx, record, owner))
            .then(ANCHOR_TIER_LEGACY, move |r| r.register_model(&anchor_ctx, record))
            .run(registry);
        let result = match &outcome {
            ChainOutcome::Resolved { tier, .. } => AnchorOutcome { success: true, tier: Some(*tier) },
            ChainOutcome::Exhausted { failures } => {
                warn!(%model_id, attempts = failures.len(), last_error = ?failures.last().map(|f| &f.error), "model anchoring failed");
                AnchorOutcome { success: false, tier: None }
            }
        };
        metrics::record_anchoring(result.success, result.tier.unwrap_or("none"));
        self.events.emit(LedgerEvent::ModelAnchored { model_id, success: result.success, tier: result.tier.map(str::to_string) });
        result
    }

    pub fn get_model(&self, model_id: &Digest) -> LedgerResult<&Model> {
        self.models.get(model_id).ok_or(LedgerError::ModelNotFound(*model_id))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    // --- inference operators ---

    pub fn set_inference_operator(&mut self, ctx: &CallContext, model_id: Digest, account: Account, allowed: bool) -> LedgerResult<()> {
        observe("model.set_inference_operator", || {
            self.admin.ensure_active()?;
            self.model_owned_by(&model_id, &ctx.caller)?;
            let key = (model_id, account);
            let was = if allowed { !self.operators.insert(key) } else { self.operators.remove(&key) };
            self.journal.record(ModelUndo::Operator { key, was });
            self.events.emit(LedgerEvent::InferenceOperatorSet { model_id, account, allowed });
            Ok(())
        })
    }

    pub fn is_inference_actor(&self, model_id: &Digest, account: &Account) -> bool {
        match self.models.get(model_id) {
            Some(m) => m.owner == *account || self.operators.contains(&(*model_id, *account)),
            None => false,
        }
    }

    fn ensure_inference_actor(&self, ctx: &CallContext, model_id: &Digest) -> LedgerResult<()> {
        if !self.models.contains_key(model_id) {
            return Err(LedgerError::ModelNotFound(*model_id));
        }
        if !self.is_inference_actor(model_id, &ctx.caller) {
            return Err(LedgerError::NotAuthorized { caller: ctx.caller });
        }
        Ok(())
    }

    // --- training runs ---

    pub fn start_training_run(&mut self, ctx: &CallContext, model_id: Digest, config_hash: Digest) -> LedgerResult<u64> {
        observe("model.start_training_run", || {
            self.admin.ensure_active()?;
            self.model_owned_by(&model_id, &ctx.caller)?;
            let run_id = self.next_run_id;
            self.next_run_id += 1;
            self.runs.insert(run_id, TrainingRun { model_id, config_hash, started_at: ctx.now, result: None });
            self.journal.record(ModelUndo::RunStarted(run_id));
            info!(run_id, %model_id, "training run started");
            self.events.emit(LedgerEvent::TrainingRunStarted { run_id, model_id, config_hash, started_at: ctx.now });
            Ok(run_id)
        })
    }

    pub fn finalize_training_run(
        &mut self,
        ctx: &CallContext,
        run_id: u64,
        weights_hash: Digest,
        metrics_hash: Digest,
        artifacts_ref: &str,
    ) -> LedgerResult<()> {
        observe("model.finalize_training_run", || {
            self.admin.ensure_active()?;
            let run = self.runs.get(&run_id).ok_or(LedgerError::RunNotFound(run_id))?;
            let model_id = run.model_id;
            self.model_owned_by(&model_id, &ctx.caller)?;
            if run.is_finalized() {
                return Err(LedgerError::RunAlreadyFinalized(run_id));
            }
            let result = RunResult { weights_hash, metrics_hash, artifacts_ref: artifacts_ref.to_string(), finalized_at: ctx.now };
            if let Some(run) = self.runs.get_mut(&run_id) {
                run.result = Some(result);
                self.journal.record(ModelUndo::RunFinalized(run_id));
            }
            info!(run_id, %model_id, %weights_hash, "training run finalized");
            self.events.emit(LedgerEvent::TrainingRunFinalized {
                run_id,
                model_id,
                weights_hash,
                metrics_hash,
                artifacts_ref: artifacts_ref.to_string(),
                finalized_at: ctx.now,
            });
            Ok(())
        })
    }

    pub fn get_training_run(&self, run_id: u64) -> LedgerResult<&TrainingRun> {
        self.runs.get(&run_id).ok_or(LedgerError::RunNotFound(run_id))
    }

    pub fn runs_for_model(&self, model_id: &Digest) -> Vec<(u64, &TrainingRun)> {
        self.runs.iter().filter(|(_, r)| r.model_id == *model_id).map(|(id, r)| (*id, r)).collect()
    }

    // --- inference ---

    /// Single inference notification. Cost grows with every call, so this is
    /// for low volume; batches go through [`commit_inference_batch`](Self::commit_inference_batch).
    pub fn log_inference(
        &mut self,
        ctx: &CallContext,
        model_id: Digest,
        input_hash: Digest,
        output_hash: Digest,
        xai_hash: Digest,
        xai_ref: &str,
    ) -> LedgerResult<Digest> {
        observe("model.log_inference", || {
            self.admin.ensure_active()?;
            self.ensure_inference_actor(ctx, &model_id)?;
            let leaf = merkle::inference_leaf(&input_hash, &output_hash, &xai_hash);
            self.events.emit(LedgerEvent::InferenceLogged {
                model_id,
                caller: ctx.caller,
                input_hash,
                output_hash,
                xai_hash,
                leaf,
                xai_ref: xai_ref.to_string(),
                timestamp: ctx.now,
            });
            Ok(leaf)
        })
    }

    /// Commits a caller-built root over `count` inference leaves. No tree work
    /// happens here, so the cost is the same for any batch size.
    pub fn commit_inference_batch(&mut self, ctx: &CallContext, model_id: Digest, batch_root: Digest, count: u64, batch_ref: &str) -> LedgerResult<()> {
        observe("model.commit_inference_batch", || {
            self.admin.ensure_active()?;
            self.ensure_inference_actor(ctx, &model_id)?;
            if batch_root.is_zero() {
                return Err(LedgerError::ZeroValue("batch_root"));
            }
            if count == 0 {
                return Err(LedgerError::EmptyBatch);
            }
            info!(%model_id, %batch_root, count, "inference batch committed");
            self.events.emit(LedgerEvent::InferenceBatchCommitted {
                model_id,
                caller: ctx.caller,
                batch_root,
                count,
                batch_ref: batch_ref.to_string(),
                timestamp: ctx.now,
            });
            Ok(())
        })
    }

    pub fn compute_inference_leaf(input_hash: &Digest, output_hash: &Digest, xai_hash: &Digest) -> Digest {
        merkle::inference_leaf(input_hash, output_hash, xai_hash)
    }

    pub fn verify_batch_proof(proof: &[Digest], batch_root: &Digest, leaf: &Digest) -> bool {
        merkle::verify(proof, batch_root, leaf)
    }

    /// Recomputes the leaf from its three hashes before checking membership.
    pub fn verify_batch_membership(proof: &[Digest], batch_root: &Digest, input_hash: &Digest, output_hash: &Digest, xai_hash: &Digest) -> bool {
        merkle::verify(proof, batch_root, &merkle::inference_leaf(input_hash, output_hash, xai_hash))
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }
}

impl Transactional for ModelProvenanceLedger {
    fn begin(&mut self) {
        self.journal.begin(self.events.len());
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    // Ids and nonces step back too, so a retried call derives the same ones.
    fn rollback(&mut self) {
        let Some((event_mark, undo)) = self.journal.unwind() else { return };
        for entry in undo {
            match entry {
                ModelUndo::Admin(before) => self.admin = before,
                ModelUndo::ModelInserted(model_id) => {
                    self.models.remove(&model_id);
                    self.creation_nonce -= 1;
                }
                ModelUndo::Operator { key, was: true } => {
                    self.operators.insert(key);
                }
                ModelUndo::Operator { key, was: false } => {
                    self.operators.remove(&key);
                }
                ModelUndo::RunStarted(run_id) => {
                    self.runs.remove(&run_id);
                    self.next_run_id = run_id;
                }
                ModelUndo::RunFinalized(run_id) => {
                    if let Some(run) = self.runs.get_mut(&run_id) {
                        run.result = None;
                    }
                }
            }
        }
        self.events.truncate(event_mark);
    }
}

impl ModelDirectory for ModelProvenanceLedger {
    fn model_owner(&self, model_id: &Digest) -> Option<Account> {
        self.models.get(model_id).map(|m| m.owner)
    }
}

/// Strict versioned accessor first, then raw indexed access; a zero root counts
/// as absent in either tier.
fn resolve_dataset_root(registry: &mut dyn DatasetRegistry, dataset_id: &Digest, version: u64) -> LedgerResult<Digest> {
    let id = *dataset_id;
    let not_found = LedgerError::DatasetVersionNotFound { dataset_id: id, version };
    AttemptChain::<dyn DatasetRegistry + '_, Digest, LedgerError>::new("dataset_root")
        .then("versioned", move |r| r.dataset_root(&id, version).and_then(|root| nonzero_root(root, not_found)))
        .then("indexed", move |r| {
            version
                .checked_sub(1)
                .and_then(|index| r.dataset_root_at(&id, index))
                .filter(|root| !root.is_zero())
                .ok_or(LedgerError::DatasetVersionNotFound { dataset_id: id, version })
        })
        .resolve(registry)
        .map(|(_, root)| root)
        .map_err(|_| LedgerError::DatasetVersionNotFound { dataset_id: id, version })
}

fn nonzero_root(root: Digest, err: LedgerError) -> LedgerResult<Digest> {
    if root.is_zero() { Err(err) } else { Ok(root) }
}
