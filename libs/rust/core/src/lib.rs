//! Core shared primitives for the model provenance ledger.
//!
//! Everything here is deterministic and free of ledger state: digests and
//! accounts, the sorted-pair Merkle rule, domain-separated message hashing,
//! signature recovery, the error taxonomy, config and telemetry bootstrap.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod crypto_secp;
pub mod error;
pub mod hashing;
pub mod merkle;
pub mod metrics;
pub mod typed_data;
pub mod types;

pub use config::{load_config, LedgerConfig};
pub use crypto_secp::{LocalSigner, Secp256k1Backend, SignatureBackend};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use hashing::{compute_dataset_id, derive_model_id, keccak256};
pub use merkle::MerkleTree;
pub use typed_data::{FieldValue, SigningDomain, TypedStruct};
pub use types::{Account, Digest, Timestamp, MAX_TIMESTAMP};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber once. `RUST_LOG` wins over `default_level`;
/// `json` switches to one JSON object per event (also `PROVENANCE_JSON_LOG=1`).
pub fn init_tracing(service: &str, default_level: &str, json: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let json = json
            || std::env::var("PROVENANCE_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let res = if json {
            tracing_subscriber::fmt()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_env_filter(filter)
                .try_init()
        };
        res.map_err(|e| anyhow!("tracing init failed: {e}"))
    })?;
    info!(target: "provenance", service, "tracing initialized");
    Ok(())
}
