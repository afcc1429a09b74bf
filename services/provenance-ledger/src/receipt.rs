//! Publisher-signed inference receipt. Never stored; it only exists while a
//! verification call runs.

use serde::{Deserialize, Serialize};

use provenance_core::{Account, Digest, FieldValue, Timestamp, TypedStruct};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub model_id: Digest,
    pub weights_hash: Digest,
    pub batch_root: Digest,
    pub batch_ref: String,
    pub tx_ref: String,
    pub index: u64,
    pub leaf: Digest,
    pub publisher: Account,
    pub timestamp: Timestamp,
}

impl TypedStruct for Receipt {
    const TYPE_NAME: &'static str = "Receipt";

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("modelId", FieldValue::Bytes32(self.model_id)),
            ("weightsHash", FieldValue::Bytes32(self.weights_hash)),
            ("batchRoot", FieldValue::Bytes32(self.batch_root)),
            ("batchRef", FieldValue::Str(&self.batch_ref)),
            ("txRef", FieldValue::Str(&self.tx_ref)),
            ("index", FieldValue::Uint(self.index)),
            ("leaf", FieldValue::Bytes32(self.leaf)),
            ("publisher", FieldValue::Address(self.publisher)),
            ("timestamp", FieldValue::Uint(self.timestamp)),
        ]
    }
}
