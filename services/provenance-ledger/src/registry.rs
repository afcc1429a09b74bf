//! Narrow interfaces between ledger components.
//!
//! `ModelProvenanceLedger` only sees a dataset registry through
//! [`DatasetRegistry`]; `OutputAuthenticator` only sees model ownership through
//! [`ModelDirectory`]. Older registry deployments lack the strict versioned
//! accessor and the operator-aware registration, so those default to
//! `Unsupported` and callers fall back to the legacy entry points.

use serde::{Deserialize, Serialize};

use provenance_core::{Account, Digest, LedgerError, LedgerResult};

use crate::context::CallContext;

/// Model-record mirror request sent when anchoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecordRequest {
    pub model_id: Digest,
    pub dataset_id: Digest,
    pub dataset_version: u64,
    pub training_config_hash: Digest,
}

pub trait DatasetRegistry {
    /// Root of a 1-based dataset version.
    fn dataset_root(&self, _dataset_id: &Digest, _version: u64) -> LedgerResult<Digest> {
        Err(LedgerError::Unsupported("dataset_root"))
    }

    /// Legacy direct access into the version array (0-based index).
    fn dataset_root_at(&self, dataset_id: &Digest, index: u64) -> Option<Digest>;

    /// Registration attributing the record to `owner` instead of the caller.
    fn register_model_operator(&mut self, _ctx: &CallContext, _req: ModelRecordRequest, _owner: Account) -> LedgerResult<()> {
        Err(LedgerError::Unsupported("register_model_operator"))
    }

    fn register_model(&mut self, ctx: &CallContext, req: ModelRecordRequest) -> LedgerResult<()>;
}

pub trait ModelDirectory {
    fn model_owner(&self, model_id: &Digest) -> Option<Account>;
}
