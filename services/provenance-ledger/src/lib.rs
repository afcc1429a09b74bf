//! Ledger-resident provenance components and their execution host.
//!
//! Each component owns its state and mutates it only through its own
//! operations. Components reach each other through the narrow traits in
//! [`registry`]; [`chain::ProvenanceChain`] wires the three together and
//! [`chain::LedgerHandle`] serializes transactions against it.

use tracing::debug;

use provenance_core::{metrics, LedgerResult};

pub mod admin;
pub mod chain;
pub mod context;
pub mod dataset_ledger;
pub mod events;
pub mod journal;
pub mod model_ledger;
pub mod output_auth;
pub mod receipt;
pub mod registry;

pub use admin::AdminControl;
pub use chain::{ChainSummary, LedgerHandle, ProvenanceChain};
pub use context::{CallContext, Clock, ManualClock, SystemClock};
pub use dataset_ledger::{DatasetLedger, DatasetVersion, ModelRecord};
pub use events::{EventLog, LedgerEvent};
pub use journal::{Journal, Transactional};
pub use model_ledger::{AnchorOutcome, CreateModelRequest, Model, ModelCreated, ModelProvenanceLedger, RunResult, RunState, TrainingRun};
pub use output_auth::{OutputAuthenticator, PublisherRule, ReceiptVerification, Record, RejectReason};
pub use receipt::Receipt;
pub use registry::{DatasetRegistry, ModelDirectory, ModelRecordRequest};

/// Runs one mutating operation and records its outcome. An applied operation
/// is only durable once the enclosing transaction commits.
pub(crate) fn observe<T>(op: &'static str, f: impl FnOnce() -> LedgerResult<T>) -> LedgerResult<T> {
    let res = f();
    match &res {
        Ok(_) => metrics::record_applied(op),
        Err(e) => {
            metrics::record_rejected(op, e.label());
            debug!(op, error = %e, "operation rejected");
        }
    }
    res
}
