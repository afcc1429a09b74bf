//! Error taxonomy shared by the ledger components.
//!
//! Mutating operations abort on any of these; `verify*` operations only return
//! them for malformed input and report verification failure as a value.

use crate::types::{Account, Digest, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    NotFound,
    StateConflict,
    Signature,
    Verification,
    Paused,
    Unsupported,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller {caller} is not the owner")]
    NotOwner { caller: Account },
    #[error("caller {caller} is not authorized")]
    NotAuthorized { caller: Account },
    #[error("caller {caller} is not the owner of model {model_id}")]
    NotModelOwner { caller: Account, model_id: Digest },
    #[error("caller {caller} is not an active publisher for model {model_id} at {at}")]
    NotActivePublisher { caller: Account, model_id: Digest, at: Timestamp },

    #[error("dataset {dataset_id} has no version {version}")]
    DatasetVersionNotFound { dataset_id: Digest, version: u64 },
    #[error("dataset {0} not found")]
    DatasetNotFound(Digest),
    #[error("model {0} not found")]
    ModelNotFound(Digest),
    #[error("training run {0} not found")]
    RunNotFound(u64),

    #[error("model {0} already exists")]
    ModelExists(Digest),
    #[error("record for content hash {0} already exists")]
    RecordExists(Digest),
    #[error("training run {0} already finalized")]
    RunAlreadyFinalized(u64),
    #[error("required field `{0}` is zero")]
    ZeroValue(&'static str),
    #[error("batch count must be positive")]
    EmptyBatch,
    #[error("invalid owner {0}")]
    InvalidOwner(Account),

    #[error("signature must be 65 bytes, got {0}")]
    SignatureLength(usize),
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("recovered signer {recovered} does not match publisher {claimed}")]
    SignerMismatch { recovered: Account, claimed: Account },

    #[error("merkle proof does not fold to {0}")]
    ProofMismatch(Digest),
    #[error("leaf {0} is revoked")]
    LeafRevoked(Digest),
    #[error("batch root {0} is revoked")]
    BatchRootRevoked(Digest),

    #[error("ledger is paused")]
    Paused,
    #[error("operation `{0}` is not supported by this registry")]
    Unsupported(&'static str),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            NotOwner { .. } | NotAuthorized { .. } | NotModelOwner { .. } | NotActivePublisher { .. } => ErrorKind::Authorization,
            DatasetVersionNotFound { .. } | DatasetNotFound(_) | ModelNotFound(_) | RunNotFound(_) => ErrorKind::NotFound,
            ModelExists(_) | RecordExists(_) | RunAlreadyFinalized(_) | ZeroValue(_) | EmptyBatch | InvalidOwner(_) => ErrorKind::StateConflict,
            SignatureLength(_) | InvalidRecoveryId(_) | SignerMismatch { .. } => ErrorKind::Signature,
            ProofMismatch(_) | LeafRevoked(_) | BatchRootRevoked(_) => ErrorKind::Verification,
            Paused => ErrorKind::Paused,
            Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Short stable label used as a metric attribute.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::Signature => "signature",
            ErrorKind::Verification => "verification",
            ErrorKind::Paused => "paused",
            ErrorKind::Unsupported => "unsupported",
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
