//! Publisher authorization, revocation and signed-receipt verification.
//!
//! Authorization for a receipt is judged at the receipt's own timestamp;
//! revocation of its leaf or batch root is judged against current state. A
//! publisher revoked today can still have yesterday's receipts verify, until
//! the owner revokes the leaf or root itself.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use provenance_core::{merkle, metrics, Account, Digest, LedgerError, LedgerResult, Secp256k1Backend, SignatureBackend, SigningDomain, Timestamp, MAX_TIMESTAMP};

use crate::admin::AdminControl;
use crate::context::CallContext;
use crate::events::{EventLog, LedgerEvent};
use crate::journal::{Journal, Transactional};
use crate::observe;
use crate::receipt::Receipt;
use crate::registry::ModelDirectory;

/// Time window during which a non-owner account may publish for a model.
/// Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublisherRule {
    pub allowed: bool,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl PublisherRule {
    pub fn permits(&self, t: Timestamp) -> bool {
        self.allowed && self.start <= t && t <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub submitter: Account,
    pub model_id: Digest,
    pub batch_root: Digest,
    pub xai_ref: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SignerMismatch,
    NotAuthorized,
    LeafRevoked,
    BatchRootRevoked,
    LeafMismatch,
    ProofMismatch,
}

impl RejectReason {
    fn label(self) -> &'static str {
        match self {
            RejectReason::SignerMismatch => "signer_mismatch",
            RejectReason::NotAuthorized => "not_authorized",
            RejectReason::LeafRevoked => "leaf_revoked",
            RejectReason::BatchRootRevoked => "batch_root_revoked",
            RejectReason::LeafMismatch => "leaf_mismatch",
            RejectReason::ProofMismatch => "proof_mismatch",
        }
    }

    /// The error a caller would raise if it chose to treat this as fatal.
    pub fn to_error(self, receipt: &Receipt, signer: Account) -> LedgerError {
        match self {
            RejectReason::SignerMismatch => LedgerError::SignerMismatch { recovered: signer, claimed: receipt.publisher },
            RejectReason::NotAuthorized => LedgerError::NotActivePublisher { caller: signer, model_id: receipt.model_id, at: receipt.timestamp },
            RejectReason::LeafRevoked => LedgerError::LeafRevoked(receipt.leaf),
            RejectReason::BatchRootRevoked => LedgerError::BatchRootRevoked(receipt.batch_root),
            RejectReason::LeafMismatch | RejectReason::ProofMismatch => LedgerError::ProofMismatch(receipt.batch_root),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptVerification {
    pub valid: bool,
    /// Recovered account; zero when the signature did not recover.
    pub signer: Account,
    pub reason: Option<RejectReason>,
}

impl ReceiptVerification {
    fn accept(signer: Account) -> Self {
        Self { valid: true, signer, reason: None }
    }

    fn reject(signer: Account, reason: RejectReason) -> Self {
        Self { valid: false, signer, reason: Some(reason) }
    }
}

#[derive(Debug, Clone)]
enum AuthUndo {
    Admin(AdminControl),
    Publisher { key: (Digest, Account), rule: Option<PublisherRule>, legacy: bool },
    LeafRevocation { key: (Digest, Digest), was: bool },
    RootRevocation { key: (Digest, Digest), was: bool },
    RecordInserted(Digest),
}

#[derive(Clone)]
pub struct OutputAuthenticator {
    domain: SigningDomain,
    admin: AdminControl,
    rules: HashMap<(Digest, Account), PublisherRule>,
    legacy_publishers: HashSet<(Digest, Account)>,
    revoked_leaves: HashSet<(Digest, Digest)>,
    revoked_roots: HashSet<(Digest, Digest)>,
    records: HashMap<Digest, Record>,
    backend: Arc<dyn SignatureBackend>,
    events: EventLog,
    journal: Journal<AuthUndo>,
}

impl fmt::Debug for OutputAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputAuthenticator")
            .field("address", &self.domain.verifying_contract)
            .field("scheme", &self.backend.scheme())
            .field("rules", &self.rules.len())
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl OutputAuthenticator {
    /// The instance address is the domain's verifying account.
    pub fn new(domain: SigningDomain, owner: Account) -> Self {
        Self::with_backend(domain, owner, Arc::new(Secp256k1Backend))
    }

    pub fn with_backend(domain: SigningDomain, owner: Account, backend: Arc<dyn SignatureBackend>) -> Self {
        Self {
            domain,
            admin: AdminControl::new(owner),
            rules: HashMap::new(),
            legacy_publishers: HashSet::new(),
            revoked_leaves: HashSet::new(),
            revoked_roots: HashSet::new(),
            records: HashMap::new(),
            backend,
            events: EventLog::default(),
            journal: Journal::default(),
        }
    }

    pub fn address(&self) -> Account {
        self.domain.verifying_contract
    }

    pub fn owner(&self) -> Account {
        self.admin.owner()
    }

    pub fn domain(&self) -> &SigningDomain {
        &self.domain
    }

    pub fn domain_separator(&self) -> Digest {
        self.domain.separator()
    }

    pub fn receipt_digest(&self, receipt: &Receipt) -> Digest {
        self.domain.digest(receipt)
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Account) -> LedgerResult<()> {
        observe("auth.transfer_ownership", || {
            let before = self.admin.clone();
            let previous = self.admin.transfer_ownership(&ctx.caller, new_owner)?;
            self.journal.record(AuthUndo::Admin(before));
            self.events.emit(LedgerEvent::OwnershipTransferred { previous, new_owner });
            Ok(())
        })
    }

    pub fn set_paused(&mut self, ctx: &CallContext, paused: bool) -> LedgerResult<()> {
        observe("auth.set_paused", || {
            let before = self.admin.clone();
            self.admin.set_paused(&ctx.caller, paused)?;
            self.journal.record(AuthUndo::Admin(before));
            self.events.emit(LedgerEvent::PauseChanged { by: ctx.caller, paused });
            Ok(())
        })
    }

    fn ensure_model_owner(&self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: &Digest) -> LedgerResult<()> {
        self.admin.ensure_active()?;
        let owner = models.model_owner(model_id).ok_or(LedgerError::ModelNotFound(*model_id))?;
        if owner != ctx.caller {
            return Err(LedgerError::NotModelOwner { caller: ctx.caller, model_id: *model_id });
        }
        Ok(())
    }

    // --- authorization ---

    /// Owner of the model, or a publisher whose rule covers `t`.
    pub fn is_authorized(&self, models: &dyn ModelDirectory, model_id: &Digest, account: &Account, t: Timestamp) -> bool {
        if models.model_owner(model_id) == Some(*account) {
            return true;
        }
        self.rules.get(&(*model_id, *account)).is_some_and(|rule| rule.permits(t))
    }

    pub fn is_authorized_now(&self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: &Digest, account: &Account) -> bool {
        self.is_authorized(models, model_id, account, ctx.now)
    }

    pub fn publisher_rule(&self, model_id: &Digest, account: &Account) -> Option<PublisherRule> {
        self.rules.get(&(*model_id, *account)).copied()
    }

    /// Legacy allow flag; ignores windows.
    pub fn is_publisher(&self, model_id: &Digest, account: &Account) -> bool {
        self.legacy_publishers.contains(&(*model_id, *account))
    }

    pub fn set_publisher(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, account: Account, allowed: bool) -> LedgerResult<()> {
        observe("auth.set_publisher", || {
            self.ensure_model_owner(models, ctx, &model_id)?;
            self.write_rule(model_id, account, PublisherRule { allowed, start: 0, end: MAX_TIMESTAMP });
            Ok(())
        })
    }

    /// An inverted window is stored as one that ended just before `start`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_publisher_window(
        &mut self,
        models: &dyn ModelDirectory,
        ctx: &CallContext,
        model_id: Digest,
        account: Account,
        allowed: bool,
        start: Timestamp,
        end: Timestamp,
    ) -> LedgerResult<()> {
        observe("auth.set_publisher_window", || {
            self.ensure_model_owner(models, ctx, &model_id)?;
            let end = if end < start { start - 1 } else { end };
            self.write_rule(model_id, account, PublisherRule { allowed, start, end });
            Ok(())
        })
    }

    fn remember_publisher(&mut self, key: (Digest, Account)) {
        if self.journal.is_open() {
            let undo = AuthUndo::Publisher { key, rule: self.rules.get(&key).copied(), legacy: self.legacy_publishers.contains(&key) };
            self.journal.record(undo);
        }
    }

    fn write_rule(&mut self, model_id: Digest, account: Account, rule: PublisherRule) {
        self.remember_publisher((model_id, account));
        self.rules.insert((model_id, account), rule);
        if rule.allowed {
            self.legacy_publishers.insert((model_id, account));
        } else {
            self.legacy_publishers.remove(&(model_id, account));
        }
        info!(%model_id, %account, allowed = rule.allowed, start = rule.start, end = rule.end, "publisher rule set");
        self.events.emit(LedgerEvent::PublisherSet { model_id, account, allowed: rule.allowed, start: rule.start, end: rule.end });
    }

    /// Ends the window at the current time. The rule's allow flag stays set so
    /// that receipts issued inside the old window remain verifiable.
    pub fn revoke_publisher(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, account: Account) -> LedgerResult<()> {
        observe("auth.revoke_publisher", || {
            self.ensure_model_owner(models, ctx, &model_id)?;
            self.remember_publisher((model_id, account));
            let rule = self.rules.entry((model_id, account)).or_default();
            rule.end = rule.end.min(ctx.now);
            self.legacy_publishers.remove(&(model_id, account));
            info!(%model_id, %account, at = ctx.now, "publisher revoked");
            self.events.emit(LedgerEvent::PublisherRevoked { model_id, account, at: ctx.now });
            Ok(())
        })
    }

    // --- revocation ---

    pub fn revoke_leaf(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, leaf: Digest) -> LedgerResult<()> {
        observe("auth.revoke_leaf", || self.set_leaf_revoked(models, ctx, model_id, leaf, true))
    }

    pub fn unrevoke_leaf(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, leaf: Digest) -> LedgerResult<()> {
        observe("auth.unrevoke_leaf", || self.set_leaf_revoked(models, ctx, model_id, leaf, false))
    }

    pub fn revoke_batch_root(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, batch_root: Digest) -> LedgerResult<()> {
        observe("auth.revoke_batch_root", || self.set_root_revoked(models, ctx, model_id, batch_root, true))
    }

    pub fn unrevoke_batch_root(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, batch_root: Digest) -> LedgerResult<()> {
        observe("auth.unrevoke_batch_root", || self.set_root_revoked(models, ctx, model_id, batch_root, false))
    }

    fn set_leaf_revoked(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, leaf: Digest, revoked: bool) -> LedgerResult<()> {
        self.ensure_model_owner(models, ctx, &model_id)?;
        let key = (model_id, leaf);
        let was = if revoked { !self.revoked_leaves.insert(key) } else { self.revoked_leaves.remove(&key) };
        self.journal.record(AuthUndo::LeafRevocation { key, was });
        self.events.emit(LedgerEvent::LeafRevocationSet { model_id, leaf, revoked });
        Ok(())
    }

    fn set_root_revoked(&mut self, models: &dyn ModelDirectory, ctx: &CallContext, model_id: Digest, batch_root: Digest, revoked: bool) -> LedgerResult<()> {
        self.ensure_model_owner(models, ctx, &model_id)?;
        let key = (model_id, batch_root);
        let was = if revoked { !self.revoked_roots.insert(key) } else { self.revoked_roots.remove(&key) };
        self.journal.record(AuthUndo::RootRevocation { key, was });
        self.events.emit(LedgerEvent::BatchRootRevocationSet { model_id, batch_root, revoked });
        Ok(())
    }

    pub fn is_leaf_revoked(&self, model_id: &Digest, leaf: &Digest) -> bool {
        self.revoked_leaves.contains(&(*model_id, *leaf))
    }

    pub fn is_batch_root_revoked(&self, model_id: &Digest, batch_root: &Digest) -> bool {
        self.revoked_roots.contains(&(*model_id, *batch_root))
    }

    // --- content records ---

    pub fn store_content_hash(
        &mut self,
        models: &dyn ModelDirectory,
        ctx: &CallContext,
        model_id: Digest,
        content_hash: Digest,
        batch_root: Digest,
        xai_ref: &str,
    ) -> LedgerResult<()> {
        observe("auth.store_content_hash", || {
            self.admin.ensure_active()?;
            if models.model_owner(&model_id).is_none() {
                return Err(LedgerError::ModelNotFound(model_id));
            }
            if !self.is_authorized_now(models, ctx, &model_id, &ctx.caller) {
                return Err(LedgerError::NotActivePublisher { caller: ctx.caller, model_id, at: ctx.now });
            }
            if content_hash.is_zero() {
                return Err(LedgerError::ZeroValue("content_hash"));
            }
            if self.records.contains_key(&content_hash) {
                return Err(LedgerError::RecordExists(content_hash));
            }
            self.records.insert(
                content_hash,
                Record { submitter: ctx.caller, model_id, batch_root, xai_ref: xai_ref.to_string(), timestamp: ctx.now },
            );
            self.journal.record(AuthUndo::RecordInserted(content_hash));
            info!(%content_hash, %model_id, submitter = %ctx.caller, "content hash stored");
            self.events.emit(LedgerEvent::ContentHashStored {
                content_hash,
                model_id,
                submitter: ctx.caller,
                batch_root,
                xai_ref: xai_ref.to_string(),
                timestamp: ctx.now,
            });
            Ok(())
        })
    }

    pub fn get_record(&self, content_hash: &Digest) -> Option<&Record> {
        self.records.get(content_hash)
    }

    // --- receipts ---

    /// Signer, authorization at the receipt's timestamp, then live revocation.
    /// `Err` only for a malformed signature.
    pub fn verify_receipt(&self, models: &dyn ModelDirectory, receipt: &Receipt, signature: &[u8]) -> LedgerResult<ReceiptVerification> {
        let digest = self.receipt_digest(receipt);
        let signer = self.backend.recover(&digest, signature)?;
        let verdict = self.judge(models, receipt, signer);
        Ok(self.finish(receipt, verdict))
    }

    /// [`verify_receipt`](Self::verify_receipt) plus proof that the receipt's
    /// leaf belongs to its batch root.
    pub fn verify_receipt_and_membership(
        &self,
        models: &dyn ModelDirectory,
        receipt: &Receipt,
        signature: &[u8],
        proof: &[Digest],
    ) -> LedgerResult<ReceiptVerification> {
        let digest = self.receipt_digest(receipt);
        let signer = self.backend.recover(&digest, signature)?;
        let mut verdict = self.judge(models, receipt, signer);
        if verdict.valid && !merkle::verify(proof, &receipt.batch_root, &receipt.leaf) {
            verdict = ReceiptVerification::reject(signer, RejectReason::ProofMismatch);
        }
        Ok(self.finish(receipt, verdict))
    }

    /// Recomputes the inference leaf from its three hashes and requires it to
    /// match the receipt before checking membership.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_receipt_for_inference(
        &self,
        models: &dyn ModelDirectory,
        receipt: &Receipt,
        signature: &[u8],
        proof: &[Digest],
        input_hash: &Digest,
        output_hash: &Digest,
        xai_hash: &Digest,
    ) -> LedgerResult<ReceiptVerification> {
        if merkle::inference_leaf(input_hash, output_hash, xai_hash) != receipt.leaf {
            let signer = self.backend.recover(&self.receipt_digest(receipt), signature)?;
            return Ok(self.finish(receipt, ReceiptVerification::reject(signer, RejectReason::LeafMismatch)));
        }
        self.verify_receipt_and_membership(models, receipt, signature, proof)
    }

    fn judge(&self, models: &dyn ModelDirectory, receipt: &Receipt, signer: Account) -> ReceiptVerification {
        if signer.is_zero() || signer != receipt.publisher {
            return ReceiptVerification::reject(signer, RejectReason::SignerMismatch);
        }
        if !self.is_authorized(models, &receipt.model_id, &signer, receipt.timestamp) {
            return ReceiptVerification::reject(signer, RejectReason::NotAuthorized);
        }
        if self.is_leaf_revoked(&receipt.model_id, &receipt.leaf) {
            return ReceiptVerification::reject(signer, RejectReason::LeafRevoked);
        }
        if self.is_batch_root_revoked(&receipt.model_id, &receipt.batch_root) {
            return ReceiptVerification::reject(signer, RejectReason::BatchRootRevoked);
        }
        ReceiptVerification::accept(signer)
    }

    fn finish(&self, receipt: &Receipt, verdict: ReceiptVerification) -> ReceiptVerification {
        let label = verdict.reason.map(RejectReason::label).unwrap_or("valid");
        metrics::record_receipt_verdict(label);
        debug!(model_id = %receipt.model_id, publisher = %receipt.publisher, signer = %verdict.signer, verdict = label, "receipt verified");
        verdict
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }
}

impl Transactional for OutputAuthenticator {
    fn begin(&mut self) {
        self.journal.begin(self.events.len());
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    fn rollback(&mut self) {
        let Some((event_mark, undo)) = self.journal.unwind() else { return };
        for entry in undo {
            match entry {
                AuthUndo::Admin(before) => self.admin = before,
                AuthUndo::Publisher { key, rule, legacy } => {
                    match rule {
                        Some(rule) => self.rules.insert(key, rule),
                        None => self.rules.remove(&key),
                    };
                    if legacy {
                        self.legacy_publishers.insert(key);
                    } else {
                        self.legacy_publishers.remove(&key);
                    }
                }
                AuthUndo::LeafRevocation { key, was } => {
                    if was {
                        self.revoked_leaves.insert(key);
                    } else {
                        self.revoked_leaves.remove(&key);
                    }
                }
                AuthUndo::RootRevocation { key, was } => {
                    if was {
                        self.revoked_roots.insert(key);
                    } else {
                        self.revoked_roots.remove(&key);
                    }
                }
                AuthUndo::RecordInserted(content_hash) => {
                    self.records.remove(&content_hash);
                }
            }
        }
        self.events.truncate(event_mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provenance_core::{ErrorKind, LocalSigner, MerkleTree};

    const OWNER: Account = Account([0x0a; 20]);
    const MODEL_OWNER: Account = Account([0xa1; 20]);
    const PUB: Account = Account([0xb0; 20]);

    struct Owners(HashMap<Digest, Account>);

    impl ModelDirectory for Owners {
        fn model_owner(&self, model_id: &Digest) -> Option<Account> {
            self.0.get(model_id).copied()
        }
    }

    fn model() -> Digest {
        Digest::from_u64(77)
    }

    fn setup() -> (OutputAuthenticator, Owners) {
        let domain = SigningDomain::new("OutputAuthenticator", "1", 31337, Account([0xd3; 20]));
        let owners = Owners(HashMap::from([(model(), MODEL_OWNER)]));
        (OutputAuthenticator::new(domain, OWNER), owners)
    }

    fn ctx(caller: Account, now: Timestamp) -> CallContext {
        CallContext::new(caller, now, 31337)
    }

    fn receipt(publisher: Account, leaf: Digest, batch_root: Digest, timestamp: Timestamp) -> Receipt {
        Receipt {
            model_id: model(),
            weights_hash: Digest::from_u64(5),
            batch_root,
            batch_ref: "ipfs://batch".into(),
            tx_ref: "0xabc".into(),
            index: 0,
            leaf,
            publisher,
            timestamp,
        }
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let (mut auth, owners) = setup();
        auth.set_publisher_window(&owners, &ctx(MODEL_OWNER, 1), model(), PUB, true, 100, 200).unwrap();
        assert!(!auth.is_authorized(&owners, &model(), &PUB, 99));
        assert!(auth.is_authorized(&owners, &model(), &PUB, 100));
        assert!(auth.is_authorized(&owners, &model(), &PUB, 200));
        assert!(!auth.is_authorized(&owners, &model(), &PUB, 201));
        assert!(auth.is_publisher(&model(), &PUB));
    }

    #[test]
    fn inverted_window_authorizes_nothing() {
        let (mut auth, owners) = setup();
        auth.set_publisher_window(&owners, &ctx(MODEL_OWNER, 1), model(), PUB, true, 500, 10).unwrap();
        assert_eq!(auth.publisher_rule(&model(), &PUB), Some(PublisherRule { allowed: true, start: 500, end: 499 }));
        assert!([0, 10, 499, 500, 501, MAX_TIMESTAMP].iter().all(|t| !auth.is_authorized(&owners, &model(), &PUB, *t)));
    }

    #[test]
    fn owner_is_always_authorized() {
        let (mut auth, owners) = setup();
        auth.set_publisher_window(&owners, &ctx(MODEL_OWNER, 1), model(), MODEL_OWNER, false, 5, 6).unwrap();
        assert!(auth.is_authorized(&owners, &model(), &MODEL_OWNER, 1000));
    }

    #[test]
    fn rules_are_model_owner_only() {
        let (mut auth, owners) = setup();
        let err = auth.set_publisher(&owners, &ctx(OWNER, 1), model(), PUB, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        let err = auth.set_publisher(&owners, &ctx(MODEL_OWNER, 1), Digest::from_u64(1), PUB, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(auth.events().is_empty());
    }

    #[test]
    fn revoke_truncates_window_and_clears_legacy_flag() {
        let (mut auth, owners) = setup();
        auth.set_publisher(&owners, &ctx(MODEL_OWNER, 1), model(), PUB, true).unwrap();
        auth.revoke_publisher(&owners, &ctx(MODEL_OWNER, 1000), model(), PUB).unwrap();
        assert!(!auth.is_publisher(&model(), &PUB));
        assert!(auth.is_authorized(&owners, &model(), &PUB, 999));
        assert!(!auth.is_authorized(&owners, &model(), &PUB, 1001));
        assert!(!auth.is_authorized_now(&owners, &ctx(PUB, 1001), &model(), &PUB));
    }

    #[test]
    fn rollback_restores_rules_revocations_and_records() {
        let (mut auth, owners) = setup();
        auth.set_publisher_window(&owners, &ctx(MODEL_OWNER, 1), model(), PUB, true, 0, 500).unwrap();
        auth.revoke_leaf(&owners, &ctx(MODEL_OWNER, 1), model(), Digest::from_u64(1)).unwrap();

        auth.begin();
        auth.revoke_publisher(&owners, &ctx(MODEL_OWNER, 10), model(), PUB).unwrap();
        auth.set_publisher(&owners, &ctx(MODEL_OWNER, 10), model(), Account([0xc0; 20]), true).unwrap();
        auth.unrevoke_leaf(&owners, &ctx(MODEL_OWNER, 10), model(), Digest::from_u64(1)).unwrap();
        auth.revoke_batch_root(&owners, &ctx(MODEL_OWNER, 10), model(), Digest::from_u64(2)).unwrap();
        auth.store_content_hash(&owners, &ctx(MODEL_OWNER, 10), model(), Digest::from_u64(3), Digest::from_u64(2), "x").unwrap();
        auth.rollback();

        assert_eq!(auth.publisher_rule(&model(), &PUB), Some(PublisherRule { allowed: true, start: 0, end: 500 }));
        assert!(auth.is_publisher(&model(), &PUB));
        assert_eq!(auth.publisher_rule(&model(), &Account([0xc0; 20])), None);
        assert!(!auth.is_publisher(&model(), &Account([0xc0; 20])));
        assert!(auth.is_leaf_revoked(&model(), &Digest::from_u64(1)));
        assert!(!auth.is_batch_root_revoked(&model(), &Digest::from_u64(2)));
        assert!(auth.get_record(&Digest::from_u64(3)).is_none());
        assert_eq!(auth.events().len(), 2);
    }

    #[test]
    fn content_hash_is_write_once() {
        let (mut auth, owners) = setup();
        let h = Digest::from_u64(9);
        assert_eq!(
            auth.store_content_hash(&owners, &ctx(PUB, 10), model(), h, Digest::from_u64(1), "a"),
            Err(LedgerError::NotActivePublisher { caller: PUB, model_id: model(), at: 10 })
        );
        auth.set_publisher(&owners, &ctx(MODEL_OWNER, 10), model(), PUB, true).unwrap();
        assert_eq!(auth.store_content_hash(&owners, &ctx(PUB, 11), model(), Digest::ZERO, Digest::ZERO, "a"), Err(LedgerError::ZeroValue("content_hash")));
        auth.store_content_hash(&owners, &ctx(PUB, 11), model(), h, Digest::from_u64(1), "first").unwrap();
        let err = auth.store_content_hash(&owners, &ctx(MODEL_OWNER, 12), model(), h, Digest::from_u64(2), "second").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        let rec = auth.get_record(&h).unwrap();
        assert_eq!((rec.submitter, rec.xai_ref.as_str(), rec.timestamp), (PUB, "first", 11));
    }

    #[test]
    fn receipt_checks_run_in_order() {
        let (mut auth, owners) = setup();
        let signer = LocalSigner::from_seed("publisher").unwrap();
        let leaf = Digest::from_u64(1);
        let root = Digest::from_u64(2);
        auth.set_publisher_window(&owners, &ctx(MODEL_OWNER, 1), model(), signer.account(), true, 100, 200).unwrap();

        let r = receipt(signer.account(), leaf, root, 150);
        let sig = signer.sign_digest(&auth.receipt_digest(&r)).unwrap();
        let ok = auth.verify_receipt(&owners, &r, &sig).unwrap();
        assert_eq!(ok, ReceiptVerification { valid: true, signer: signer.account(), reason: None });

        let claimed_other = receipt(PUB, leaf, root, 150);
        let sig_other = signer.sign_digest(&auth.receipt_digest(&claimed_other)).unwrap();
        assert_eq!(auth.verify_receipt(&owners, &claimed_other, &sig_other).unwrap().reason, Some(RejectReason::SignerMismatch));

        let late = receipt(signer.account(), leaf, root, 250);
        let sig_late = signer.sign_digest(&auth.receipt_digest(&late)).unwrap();
        assert_eq!(auth.verify_receipt(&owners, &late, &sig_late).unwrap().reason, Some(RejectReason::NotAuthorized));

        auth.revoke_batch_root(&owners, &ctx(MODEL_OWNER, 300), model(), root).unwrap();
        assert_eq!(auth.verify_receipt(&owners, &r, &sig).unwrap().reason, Some(RejectReason::BatchRootRevoked));
        auth.revoke_leaf(&owners, &ctx(MODEL_OWNER, 300), model(), leaf).unwrap();
        assert_eq!(auth.verify_receipt(&owners, &r, &sig).unwrap().reason, Some(RejectReason::LeafRevoked));
        auth.unrevoke_leaf(&owners, &ctx(MODEL_OWNER, 301), model(), leaf).unwrap();
        auth.unrevoke_batch_root(&owners, &ctx(MODEL_OWNER, 301), model(), root).unwrap();
        assert!(auth.verify_receipt(&owners, &r, &sig).unwrap().valid);
    }

    #[test]
    fn malformed_signature_is_an_error() {
        let (auth, owners) = setup();
        let r = receipt(PUB, Digest::from_u64(1), Digest::from_u64(2), 1);
        assert_eq!(auth.verify_receipt(&owners, &r, &[0u8; 10]), Err(LedgerError::SignatureLength(10)));
    }

    #[test]
    fn receipt_from_another_instance_does_not_verify() {
        let (mut auth, owners) = setup();
        let signer = LocalSigner::from_seed("publisher").unwrap();
        auth.set_publisher(&owners, &ctx(MODEL_OWNER, 1), model(), signer.account(), true).unwrap();
        let r = receipt(signer.account(), Digest::from_u64(1), Digest::from_u64(2), 5);
        let other = OutputAuthenticator::new(SigningDomain::new("OutputAuthenticator", "1", 31337, Account([0xee; 20])), OWNER);
        let sig = signer.sign_digest(&other.receipt_digest(&r)).unwrap();
        assert_ne!(auth.domain_separator(), other.domain_separator());
        assert!(!auth.verify_receipt(&owners, &r, &sig).unwrap().valid);
    }

    #[test]
    fn membership_and_leaf_recomputation() {
        let (mut auth, owners) = setup();
        let signer = LocalSigner::from_seed("publisher").unwrap();
        auth.set_publisher(&owners, &ctx(MODEL_OWNER, 1), model(), signer.account(), true).unwrap();
        let hashes: Vec<(Digest, Digest, Digest)> = (0..3u64).map(|i| (Digest::from_u64(i), Digest::from_u64(10 + i), Digest::from_u64(20 + i))).collect();
        let tree = MerkleTree::from_leaves(hashes.iter().map(|(a, b, c)| merkle::inference_leaf(a, b, c)).collect()).unwrap();

        let r = receipt(signer.account(), tree.leaf(2).unwrap(), tree.root(), 5);
        let sig = signer.sign_digest(&auth.receipt_digest(&r)).unwrap();
        let proof = tree.proof(2).unwrap();
        assert!(auth.verify_receipt_and_membership(&owners, &r, &sig, &proof).unwrap().valid);
        assert_eq!(
            auth.verify_receipt_and_membership(&owners, &r, &sig, &tree.proof(0).unwrap()).unwrap().reason,
            Some(RejectReason::ProofMismatch)
        );
        let (a, b, c) = hashes[2];
        assert!(auth.verify_receipt_for_inference(&owners, &r, &sig, &proof, &a, &b, &c).unwrap().valid);
        assert_eq!(auth.verify_receipt_for_inference(&owners, &r, &sig, &proof, &b, &a, &c).unwrap().reason, Some(RejectReason::LeafMismatch));
    }
}
