//! Versioned dataset commitments and the model-record mirror.
//!
//! Versions per dataset id are appended only: 1, 2, 3, ... with no gaps and no
//! content deduplication. Writers are the owner plus an owner-managed list of
//! authorized accounts.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use provenance_core::{compute_dataset_id, merkle, Account, Digest, LedgerError, LedgerResult, Timestamp};

use crate::admin::AdminControl;
use crate::context::CallContext;
use crate::events::{EventLog, LedgerEvent};
use crate::journal::{Journal, Transactional};
use crate::observe;
use crate::registry::{DatasetRegistry, ModelRecordRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub root: Digest,
    pub metadata_ref: String,
    pub timestamp: Timestamp,
    pub registrant: Account,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub dataset_id: Digest,
    pub dataset_version: u64,
    pub training_config_hash: Digest,
    pub timestamp: Timestamp,
    pub registrant: Account,
}

/// Inverse of one committed write.
#[derive(Debug, Clone)]
enum DatasetUndo {
    Admin(AdminControl),
    Authorized { account: Account, was: bool },
    VersionAppended(Digest),
    ModelRecordInserted(Digest),
}

#[derive(Debug, Clone)]
pub struct DatasetLedger {
    address: Account,
    admin: AdminControl,
    authorized: HashSet<Account>,
    datasets: HashMap<Digest, Vec<DatasetVersion>>,
    model_records: HashMap<Digest, ModelRecord>,
    events: EventLog,
    journal: Journal<DatasetUndo>,
}

impl DatasetLedger {
    pub fn new(address: Account, owner: Account) -> Self {
        Self {
            address,
            admin: AdminControl::new(owner),
            authorized: HashSet::new(),
            datasets: HashMap::new(),
            model_records: HashMap::new(),
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

    pub fn is_paused(&self) -> bool {
        self.admin.is_paused()
    }

    pub fn is_authorized(&self, account: &Account) -> bool {
        *account == self.admin.owner() || self.authorized.contains(account)
    }

    fn ensure_writer(&self, ctx: &CallContext) -> LedgerResult<()> {
        self.admin.ensure_active()?;
        if !self.is_authorized(&ctx.caller) {
            return Err(LedgerError::NotAuthorized { caller: ctx.caller });
        }
        Ok(())
    }

    pub fn compute_dataset_id(name: &str) -> Digest {
        compute_dataset_id(name)
    }

    // --- administration ---

    pub fn set_authorized(&mut self, ctx: &CallContext, account: Account, allowed: bool) -> LedgerResult<()> {
        observe("dataset.set_authorized", || {
            self.admin.ensure_active()?;
            self.admin.ensure_owner(&ctx.caller)?;
            let was = if allowed { !self.authorized.insert(account) } else { self.authorized.remove(&account) };
            self.journal.record(DatasetUndo::Authorized { account, was });
            info!(%account, allowed, "dataset ledger authorization updated");
            self.events.emit(LedgerEvent::AuthorizedAccountSet { account, allowed });
            Ok(())
        })
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Account) -> LedgerResult<()> {
        observe("dataset.transfer_ownership", || {
            let before = self.admin.clone();
            let previous = self.admin.transfer_ownership(&ctx.caller, new_owner)?;
            self.journal.record(DatasetUndo::Admin(before));
            self.events.emit(LedgerEvent::OwnershipTransferred { previous, new_owner });
            Ok(())
        })
    }

    pub fn set_paused(&mut self, ctx: &CallContext, paused: bool) -> LedgerResult<()> {
        observe("dataset.set_paused", || {
            let before = self.admin.clone();
            self.admin.set_paused(&ctx.caller, paused)?;
            self.journal.record(DatasetUndo::Admin(before));
            self.events.emit(LedgerEvent::PauseChanged { by: ctx.caller, paused });
            Ok(())
        })
    }

    // --- datasets ---

    /// Appends a new version and returns its 1-based number. A zero root is
    /// refused since readers treat it as "no version".
    pub fn register_dataset(&mut self, ctx: &CallContext, dataset_id: Digest, root: Digest, metadata_ref: &str) -> LedgerResult<u64> {
        observe("dataset.register_dataset", || {
            self.ensure_writer(ctx)?;
            if root.is_zero() {
                return Err(LedgerError::ZeroValue("root"));
            }
            let versions = self.datasets.entry(dataset_id).or_default();
            let version = versions.len() as u64 + 1;
            versions.push(DatasetVersion {
                root,
                metadata_ref: metadata_ref.to_string(),
                timestamp: ctx.now,
                registrant: ctx.caller,
                version,
            });
            self.journal.record(DatasetUndo::VersionAppended(dataset_id));
            info!(%dataset_id, version, %root, "dataset version registered");
            self.events.emit(LedgerEvent::DatasetRegistered {
                dataset_id,
                version,
                root,
                metadata_ref: metadata_ref.to_string(),
                registrant: ctx.caller,
                timestamp: ctx.now,
            });
            Ok(version)
        })
    }

    pub fn get_dataset_version(&self, dataset_id: &Digest, version: u64) -> LedgerResult<&DatasetVersion> {
        version
            .checked_sub(1)
            .and_then(|index| self.dataset_version_at(dataset_id, index))
            .ok_or(LedgerError::DatasetVersionNotFound { dataset_id: *dataset_id, version })
    }

    /// All versions in order; empty for an unknown dataset.
    pub fn get_dataset_versions(&self, dataset_id: &Digest) -> &[DatasetVersion] {
        self.datasets.get(dataset_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current version count; 0 when nothing is registered.
    pub fn latest_dataset_version(&self, dataset_id: &Digest) -> u64 {
        self.get_dataset_versions(dataset_id).len() as u64
    }

    pub fn latest_dataset(&self, dataset_id: &Digest) -> LedgerResult<&DatasetVersion> {
        self.get_dataset_versions(dataset_id).last().ok_or(LedgerError::DatasetNotFound(*dataset_id))
    }

    /// Legacy raw accessor: 0-based, absent instead of failing.
    pub fn dataset_version_at(&self, dataset_id: &Digest, index: u64) -> Option<&DatasetVersion> {
        let index = usize::try_from(index).ok()?;
        self.datasets.get(dataset_id).and_then(|v| v.get(index))
    }

    pub fn verify_file_hash(&self, dataset_id: &Digest, version: u64, leaf: &Digest, proof: &[Digest]) -> LedgerResult<bool> {
        let entry = self.get_dataset_version(dataset_id, version)?;
        Ok(merkle::verify(proof, &entry.root, leaf))
    }

    // --- model records ---

    pub fn register_model(&mut self, ctx: &CallContext, req: ModelRecordRequest) -> LedgerResult<()> {
        observe("dataset.register_model", || self.insert_model_record(ctx, req, ctx.caller, false))
    }

    /// Registration by a trusted intermediary; `owner_eoa` is recorded as the
    /// registrant instead of the calling account.
    pub fn register_model_operator(&mut self, ctx: &CallContext, req: ModelRecordRequest, owner_eoa: Account) -> LedgerResult<()> {
        observe("dataset.register_model_operator", || {
            if owner_eoa.is_zero() {
                return Err(LedgerError::InvalidOwner(owner_eoa));
            }
            self.insert_model_record(ctx, req, owner_eoa, true)
        })
    }

    fn insert_model_record(&mut self, ctx: &CallContext, req: ModelRecordRequest, registrant: Account, via_operator: bool) -> LedgerResult<()> {
        self.ensure_writer(ctx)?;
        self.get_dataset_version(&req.dataset_id, req.dataset_version)?;
        if self.model_records.contains_key(&req.model_id) {
            return Err(LedgerError::ModelExists(req.model_id));
        }
        self.model_records.insert(
            req.model_id,
            ModelRecord {
                dataset_id: req.dataset_id,
                dataset_version: req.dataset_version,
                training_config_hash: req.training_config_hash,
                timestamp: ctx.now,
                registrant,
            },
        );
        self.journal.record(DatasetUndo::ModelRecordInserted(req.model_id));
        info!(model_id = %req.model_id, %registrant, via_operator, "model record registered");
        self.events.emit(LedgerEvent::ModelRecordRegistered {
            model_id: req.model_id,
            dataset_id: req.dataset_id,
            dataset_version: req.dataset_version,
            training_config_hash: req.training_config_hash,
            registrant,
            via_operator,
        });
        Ok(())
    }

    pub fn get_model_record(&self, model_id: &Digest) -> Option<&ModelRecord> {
        self.model_records.get(model_id)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }
}

impl Transactional for DatasetLedger {
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
                DatasetUndo::Admin(before) => self.admin = before,
                DatasetUndo::Authorized { account, was: true } => {
                    self.authorized.insert(account);
                }
                DatasetUndo::Authorized { account, was: false } => {
                    self.authorized.remove(&account);
                }
                DatasetUndo::VersionAppended(dataset_id) => {
                    if let Some(versions) = self.datasets.get_mut(&dataset_id) {
                        versions.pop();
                        if versions.is_empty() {
                            self.datasets.remove(&dataset_id);
                        }
                    }
                }
                DatasetUndo::ModelRecordInserted(model_id) => {
                    self.model_records.remove(&model_id);
                }
            }
        }
        self.events.truncate(event_mark);
    }
}

impl DatasetRegistry for DatasetLedger {
    fn dataset_root(&self, dataset_id: &Digest, version: u64) -> LedgerResult<Digest> {
        self.get_dataset_version(dataset_id, version).map(|v| v.root)
    }

    fn dataset_root_at(&self, dataset_id: &Digest, index: u64) -> Option<Digest> {
        self.dataset_version_at(dataset_id, index).map(|v| v.root)
    }

    fn register_model_operator(&mut self, ctx: &CallContext, req: ModelRecordRequest, owner: Account) -> LedgerResult<()> {
        DatasetLedger::register_model_operator(self, ctx, req, owner)
    }

    fn register_model(&mut self, ctx: &CallContext, req: ModelRecordRequest) -> LedgerResult<()> {
        DatasetLedger::register_model(self, ctx, req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provenance_core::{ErrorKind, MerkleTree};

    const OWNER: Account = Account([0x0a; 20]);
    const WRITER: Account = Account([0x0b; 20]);
    const STRANGER: Account = Account([0x0c; 20]);

    fn ctx(caller: Account, now: Timestamp) -> CallContext {
        CallContext::new(caller, now, 31337)
    }

    fn ledger() -> DatasetLedger {
        DatasetLedger::new(Account([0xd1; 20]), OWNER)
    }

    #[test]
    fn versions_are_gapless_and_in_call_order() {
        let mut l = ledger();
        let id = DatasetLedger::compute_dataset_id("wikitext");
        for expected in 1..=5u64 {
            let root = Digest::from_u64(expected * 10);
            assert_eq!(l.register_dataset(&ctx(OWNER, expected), id, root, "ipfs://meta").unwrap(), expected);
        }
        let versions: Vec<u64> = l.get_dataset_versions(&id).iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
        assert_eq!(l.latest_dataset_version(&id), 5);
        assert_eq!(l.latest_dataset(&id).unwrap().root, Digest::from_u64(50));
    }

    #[test]
    fn zero_root_is_refused() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        assert_eq!(l.register_dataset(&ctx(OWNER, 1), id, Digest::ZERO, "m"), Err(LedgerError::ZeroValue("root")));
        assert_eq!(l.latest_dataset_version(&id), 0);
        assert!(l.get_dataset_version(&id, 1).is_err());
        assert!(l.events().is_empty());
    }

    #[test]
    fn out_of_range_versions_never_alias() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        l.register_dataset(&ctx(OWNER, 1), id, Digest::from_u64(2), "a").unwrap();
        assert!(l.get_dataset_version(&id, (1u64 << 32) + 1).is_err());
        assert!(l.get_dataset_version(&id, u64::MAX).is_err());
        assert!(l.dataset_version_at(&id, 1u64 << 32).is_none());
        assert!(l.dataset_version_at(&id, u64::MAX).is_none());
    }

    #[test]
    fn rollback_undoes_every_write_since_begin() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        l.register_dataset(&ctx(OWNER, 1), id, Digest::from_u64(2), "a").unwrap();

        l.begin();
        l.register_dataset(&ctx(OWNER, 2), id, Digest::from_u64(3), "b").unwrap();
        l.register_dataset(&ctx(OWNER, 2), Digest::from_u64(9), Digest::from_u64(4), "c").unwrap();
        l.set_authorized(&ctx(OWNER, 2), WRITER, true).unwrap();
        let req = ModelRecordRequest { model_id: Digest::from_u64(8), dataset_id: id, dataset_version: 2, training_config_hash: Digest::ZERO };
        l.register_model(&ctx(OWNER, 2), req).unwrap();
        l.transfer_ownership(&ctx(OWNER, 2), STRANGER).unwrap();
        l.rollback();

        assert_eq!(l.latest_dataset_version(&id), 1);
        assert!(l.get_dataset_versions(&Digest::from_u64(9)).is_empty());
        assert!(!l.is_authorized(&WRITER));
        assert!(l.get_model_record(&req.model_id).is_none());
        assert_eq!(l.owner(), OWNER);
        assert_eq!(l.events().len(), 1);
    }

    #[test]
    fn commit_keeps_writes() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        l.begin();
        l.register_dataset(&ctx(OWNER, 1), id, Digest::from_u64(2), "a").unwrap();
        l.commit();
        l.rollback();
        assert_eq!(l.latest_dataset_version(&id), 1);
    }

    #[test]
    fn same_root_registers_a_new_version() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        let root = Digest::from_u64(2);
        l.register_dataset(&ctx(OWNER, 1), id, root, "a").unwrap();
        assert_eq!(l.register_dataset(&ctx(OWNER, 1), id, root, "a").unwrap(), 2);
    }

    #[test]
    fn version_zero_and_past_end_are_not_found() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        l.register_dataset(&ctx(OWNER, 1), id, Digest::from_u64(2), "a").unwrap();
        assert_eq!(l.get_dataset_version(&id, 0).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(l.get_dataset_version(&id, 2).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(l.get_dataset_version(&id, 1).is_ok());
        assert!(l.dataset_version_at(&id, 0).is_some());
        assert!(l.dataset_version_at(&id, 1).is_none());
    }

    #[test]
    fn writers_must_be_owner_or_authorized() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        let err = l.register_dataset(&ctx(WRITER, 1), id, Digest::from_u64(2), "a").unwrap_err();
        assert_eq!(err, LedgerError::NotAuthorized { caller: WRITER });
        assert!(l.set_authorized(&ctx(STRANGER, 1), WRITER, true).is_err());
        l.set_authorized(&ctx(OWNER, 1), WRITER, true).unwrap();
        assert_eq!(l.register_dataset(&ctx(WRITER, 2), id, Digest::from_u64(2), "a").unwrap(), 1);
        l.set_authorized(&ctx(OWNER, 3), WRITER, false).unwrap();
        assert!(l.register_dataset(&ctx(WRITER, 4), id, Digest::from_u64(3), "b").is_err());
        assert_eq!(l.latest_dataset_version(&id), 1);
    }

    #[test]
    fn verify_file_hash_against_stored_root() {
        let mut l = ledger();
        let files: Vec<Vec<u8>> = (0..7u8).map(|i| vec![i; 16]).collect();
        let tree = MerkleTree::from_files(&files).unwrap();
        let id = Digest::from_u64(9);
        l.register_dataset(&ctx(OWNER, 1), id, tree.root(), "ipfs://m").unwrap();
        let leaf = tree.leaf(3).unwrap();
        let proof = tree.proof(3).unwrap();
        assert!(l.verify_file_hash(&id, 1, &leaf, &proof).unwrap());
        assert!(!l.verify_file_hash(&id, 1, &Digest::from_u64(123), &proof).unwrap());
        assert!(l.verify_file_hash(&id, 2, &leaf, &proof).is_err());
    }

    #[test]
    fn model_records_are_create_once() {
        let mut l = ledger();
        let ds = Digest::from_u64(1);
        l.register_dataset(&ctx(OWNER, 1), ds, Digest::from_u64(2), "a").unwrap();
        let req = ModelRecordRequest { model_id: Digest::from_u64(77), dataset_id: ds, dataset_version: 1, training_config_hash: Digest::from_u64(5) };
        l.register_model(&ctx(OWNER, 2), req).unwrap();
        assert_eq!(l.register_model(&ctx(OWNER, 3), req), Err(LedgerError::ModelExists(req.model_id)));
        assert_eq!(l.get_model_record(&req.model_id).unwrap().timestamp, 2);
    }

    #[test]
    fn operator_registration_attributes_end_user() {
        let mut l = ledger();
        let ds = Digest::from_u64(1);
        l.register_dataset(&ctx(OWNER, 1), ds, Digest::from_u64(2), "a").unwrap();
        l.set_authorized(&ctx(OWNER, 1), WRITER, true).unwrap();
        let req = ModelRecordRequest { model_id: Digest::from_u64(8), dataset_id: ds, dataset_version: 1, training_config_hash: Digest::ZERO };
        l.register_model_operator(&ctx(WRITER, 2), req, STRANGER).unwrap();
        assert_eq!(l.get_model_record(&req.model_id).unwrap().registrant, STRANGER);
    }

    #[test]
    fn model_record_requires_existing_version() {
        let mut l = ledger();
        let req = ModelRecordRequest { model_id: Digest::from_u64(8), dataset_id: Digest::from_u64(1), dataset_version: 1, training_config_hash: Digest::ZERO };
        assert_eq!(l.register_model(&ctx(OWNER, 1), req).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(l.events().is_empty());
    }

    #[test]
    fn pause_blocks_writes_but_not_reads() {
        let mut l = ledger();
        let id = Digest::from_u64(1);
        l.register_dataset(&ctx(OWNER, 1), id, Digest::from_u64(2), "a").unwrap();
        l.set_paused(&ctx(OWNER, 2), true).unwrap();
        assert_eq!(l.register_dataset(&ctx(OWNER, 3), id, Digest::from_u64(3), "b"), Err(LedgerError::Paused));
        assert!(l.get_dataset_version(&id, 1).is_ok());
        l.set_paused(&ctx(OWNER, 4), false).unwrap();
        assert_eq!(l.register_dataset(&ctx(OWNER, 5), id, Digest::from_u64(3), "b").unwrap(), 2);
    }
}
