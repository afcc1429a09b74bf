//! Execution host for the three components.
//!
//! `ProvenanceChain` holds the components side by side and routes the calls
//! that need more than one of them. `LedgerHandle` gives it the environment
//! guarantees the components assume: one transaction at a time, a shared clock
//! per step, and all-or-nothing application.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use provenance_core::{metrics, Account, Digest, LedgerConfig, LedgerResult, Timestamp};

use crate::context::{CallContext, Clock};
use crate::dataset_ledger::DatasetLedger;
use crate::events::LedgerEvent;
use crate::journal::Transactional;
use crate::model_ledger::{CreateModelRequest, ModelCreated, ModelProvenanceLedger};
use crate::output_auth::{OutputAuthenticator, ReceiptVerification};
use crate::receipt::Receipt;

#[derive(Debug, Clone, Serialize)]
pub struct ChainSummary {
    pub chain_id: u64,
    pub owner: Account,
    pub dataset_ledger: Account,
    pub model_ledger: Account,
    pub output_authenticator: Account,
    pub domain_separator: Digest,
    pub models: usize,
    pub pending_events: usize,
}

#[derive(Debug, Clone)]
pub struct ProvenanceChain {
    chain_id: u64,
    datasets: DatasetLedger,
    models: ModelProvenanceLedger,
    auth: OutputAuthenticator,
}

impl ProvenanceChain {
    /// Deploys the three components under `config.owner` and grants the model
    /// ledger write access to the dataset ledger so anchoring can succeed.
    pub fn genesis(config: &LedgerConfig) -> LedgerResult<Self> {
        let mut datasets = DatasetLedger::new(config.dataset_ledger, config.owner);
        let models = ModelProvenanceLedger::new(config.model_ledger, config.owner);
        let auth = OutputAuthenticator::new(config.signing_domain(), config.owner);
        let ctx = CallContext::new(config.owner, 0, config.chain_id);
        datasets.set_authorized(&ctx, config.model_ledger, true)?;
        info!(chain_id = config.chain_id, owner = %config.owner, "provenance chain initialized");
        Ok(Self { chain_id: config.chain_id, datasets, models, auth })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn datasets(&self) -> &DatasetLedger {
        &self.datasets
    }

    pub fn datasets_mut(&mut self) -> &mut DatasetLedger {
        &mut self.datasets
    }

    pub fn models(&self) -> &ModelProvenanceLedger {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut ModelProvenanceLedger {
        &mut self.models
    }

    pub fn authenticator(&self) -> &OutputAuthenticator {
        &self.auth
    }

    // --- model ledger <-> dataset ledger ---

    pub fn create_model(&mut self, ctx: &CallContext, req: CreateModelRequest) -> LedgerResult<ModelCreated> {
        self.models.create_model(&mut self.datasets, ctx, req)
    }

    pub fn create_model_by_name(&mut self, ctx: &CallContext, dataset_name: &str, req: CreateModelRequest) -> LedgerResult<ModelCreated> {
        self.models.create_model_by_name(&mut self.datasets, ctx, dataset_name, req)
    }

    // --- authenticator <-> model ledger ---

    pub fn set_publisher(&mut self, ctx: &CallContext, model_id: Digest, account: Account, allowed: bool) -> LedgerResult<()> {
        self.auth.set_publisher(&self.models, ctx, model_id, account, allowed)
    }

    pub fn set_publisher_window(
        &mut self,
        ctx: &CallContext,
        model_id: Digest,
        account: Account,
        allowed: bool,
        start: Timestamp,
        end: Timestamp,
    ) -> LedgerResult<()> {
        self.auth.set_publisher_window(&self.models, ctx, model_id, account, allowed, start, end)
    }

    pub fn revoke_publisher(&mut self, ctx: &CallContext, model_id: Digest, account: Account) -> LedgerResult<()> {
        self.auth.revoke_publisher(&self.models, ctx, model_id, account)
    }

    pub fn revoke_leaf(&mut self, ctx: &CallContext, model_id: Digest, leaf: Digest) -> LedgerResult<()> {
        self.auth.revoke_leaf(&self.models, ctx, model_id, leaf)
    }

    pub fn unrevoke_leaf(&mut self, ctx: &CallContext, model_id: Digest, leaf: Digest) -> LedgerResult<()> {
        self.auth.unrevoke_leaf(&self.models, ctx, model_id, leaf)
    }

    pub fn revoke_batch_root(&mut self, ctx: &CallContext, model_id: Digest, batch_root: Digest) -> LedgerResult<()> {
        self.auth.revoke_batch_root(&self.models, ctx, model_id, batch_root)
    }

    pub fn unrevoke_batch_root(&mut self, ctx: &CallContext, model_id: Digest, batch_root: Digest) -> LedgerResult<()> {
        self.auth.unrevoke_batch_root(&self.models, ctx, model_id, batch_root)
    }

    pub fn store_content_hash(&mut self, ctx: &CallContext, model_id: Digest, content_hash: Digest, batch_root: Digest, xai_ref: &str) -> LedgerResult<()> {
        self.auth.store_content_hash(&self.models, ctx, model_id, content_hash, batch_root, xai_ref)
    }

    pub fn is_authorized(&self, model_id: &Digest, account: &Account, t: Timestamp) -> bool {
        self.auth.is_authorized(&self.models, model_id, account, t)
    }

    pub fn verify_receipt(&self, receipt: &Receipt, signature: &[u8]) -> LedgerResult<ReceiptVerification> {
        self.auth.verify_receipt(&self.models, receipt, signature)
    }

    pub fn verify_receipt_and_membership(&self, receipt: &Receipt, signature: &[u8], proof: &[Digest]) -> LedgerResult<ReceiptVerification> {
        self.auth.verify_receipt_and_membership(&self.models, receipt, signature, proof)
    }

    /// Verifies and turns a negative verdict into the matching error, for
    /// composite transactions that must abort on an invalid receipt.
    pub fn require_receipt(&self, receipt: &Receipt, signature: &[u8], proof: &[Digest]) -> LedgerResult<Account> {
        let verdict = self.verify_receipt_and_membership(receipt, signature, proof)?;
        match verdict.reason {
            None => Ok(verdict.signer),
            Some(reason) => Err(reason.to_error(receipt, verdict.signer)),
        }
    }

    /// Events from all three components, dataset ledger first.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        let mut out = self.datasets.drain_events();
        out.extend(self.models.drain_events());
        out.extend(self.auth.drain_events());
        out
    }

    pub fn summary(&self) -> ChainSummary {
        ChainSummary {
            chain_id: self.chain_id,
            owner: self.models.owner(),
            dataset_ledger: self.datasets.address(),
            model_ledger: self.models.address(),
            output_authenticator: self.auth.address(),
            domain_separator: self.auth.domain_separator(),
            models: self.models.model_count(),
            pending_events: self.datasets.events().len() + self.models.events().len() + self.auth.events().len(),
        }
    }
}

impl Transactional for ProvenanceChain {
    fn begin(&mut self) {
        self.datasets.begin();
        self.models.begin();
        self.auth.begin();
    }

    fn commit(&mut self) {
        self.datasets.commit();
        self.models.commit();
        self.auth.commit();
    }

    fn rollback(&mut self) {
        self.auth.rollback();
        self.models.rollback();
        self.datasets.rollback();
    }
}

/// Shared, serialized access to a [`ProvenanceChain`].
#[derive(Clone)]
pub struct LedgerHandle {
    chain: Arc<RwLock<ProvenanceChain>>,
    clock: Arc<dyn Clock>,
}

impl LedgerHandle {
    pub fn new(chain: ProvenanceChain, clock: Arc<dyn Clock>) -> Self {
        Self { chain: Arc::new(RwLock::new(chain)), clock }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Runs `f` as one step: exclusive access, a single timestamp, and every
    /// write `f` made undone if it fails anywhere. Only the writes are
    /// journaled, so the cost does not grow with ledger size.
    pub fn transact<T, F>(&self, caller: Account, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut ProvenanceChain, &CallContext) -> LedgerResult<T>,
    {
        let mut chain = self.chain.write();
        let ctx = CallContext::new(caller, self.clock.now(), chain.chain_id());
        chain.begin();
        match f(&mut chain, &ctx) {
            Ok(value) => {
                chain.commit();
                metrics::record_transaction(true);
                debug!(%caller, at = ctx.now, "transaction committed");
                Ok(value)
            }
            Err(e) => {
                chain.rollback();
                metrics::record_transaction(false);
                warn!(%caller, at = ctx.now, kind = e.label(), error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&ProvenanceChain) -> T) -> T {
        f(&self.chain.read())
    }

    pub fn summary(&self) -> ChainSummary {
        self.read(ProvenanceChain::summary)
    }
}

impl std::fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHandle").field("now", &self.clock.now()).finish_non_exhaustive()
    }
}

