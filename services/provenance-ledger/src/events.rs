//! Notifications emitted by committed operations.
//!
//! Exactly one event per successful mutating call (model creation with
//! anchoring adds the anchoring outcome). Aborted calls emit nothing because
//! events are appended only after every check has passed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use provenance_core::{Account, Digest, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    OwnershipTransferred { previous: Account, new_owner: Account },
    PauseChanged { by: Account, paused: bool },
    AuthorizedAccountSet { account: Account, allowed: bool },

    DatasetRegistered { dataset_id: Digest, version: u64, root: Digest, metadata_ref: String, registrant: Account, timestamp: Timestamp },
    ModelRecordRegistered { model_id: Digest, dataset_id: Digest, dataset_version: u64, training_config_hash: Digest, registrant: Account, via_operator: bool },

    ModelCreated {
        model_id: Digest,
        owner: Account,
        dataset_id: Digest,
        dataset_version: u64,
        dataset_root: Digest,
        code_hash: Digest,
        arch_hash: Digest,
        model_uri: String,
        initial_config_hash: Digest,
    },
    ModelAnchored { model_id: Digest, success: bool, tier: Option<String> },
    InferenceOperatorSet { model_id: Digest, account: Account, allowed: bool },
    TrainingRunStarted { run_id: u64, model_id: Digest, config_hash: Digest, started_at: Timestamp },
    TrainingRunFinalized { run_id: u64, model_id: Digest, weights_hash: Digest, metrics_hash: Digest, artifacts_ref: String, finalized_at: Timestamp },
    InferenceLogged { model_id: Digest, caller: Account, input_hash: Digest, output_hash: Digest, xai_hash: Digest, leaf: Digest, xai_ref: String, timestamp: Timestamp },
    InferenceBatchCommitted { model_id: Digest, caller: Account, batch_root: Digest, count: u64, batch_ref: String, timestamp: Timestamp },

    PublisherSet { model_id: Digest, account: Account, allowed: bool, start: Timestamp, end: Timestamp },
    PublisherRevoked { model_id: Digest, account: Account, at: Timestamp },
    LeafRevocationSet { model_id: Digest, leaf: Digest, revoked: bool },
    BatchRootRevocationSet { model_id: Digest, batch_root: Digest, revoked: bool },
    ContentHashStored { content_hash: Digest, model_id: Digest, submitter: Account, batch_root: Digest, xai_ref: String, timestamp: Timestamp },
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn emit(&mut self, event: LedgerEvent) {
        debug!(?event, "ledger event");
        self.events.push(event);
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drops events emitted after `len`; used when a transaction rolls back.
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }
}
