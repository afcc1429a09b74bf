//! Ledger host configuration.
//!
//! Sources, lowest precedence first: built-in defaults, optional YAML/TOML/JSON
//! file named by `PROVENANCE_CONFIG_FILE`, then `PROVENANCE_*` environment
//! variables (`__` separates nested keys).

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::Account;
use crate::typed_data::SigningDomain;

pub const ENV_PREFIX: &str = "PROVENANCE";
pub const CONFIG_FILE_ENV: &str = "PROVENANCE_CONFIG_FILE";

// Devnet identities; real deployments override all of these.
const DEV_OWNER: Account = Account([0x0a; 20]);
const DEV_DATASET_LEDGER: Account = Account([0xd1; 20]);
const DEV_MODEL_LEDGER: Account = Account([0xd2; 20]);
const DEV_AUTHENTICATOR: Account = Account([0xd3; 20]);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_owner")]
    pub owner: Account,
    #[serde(default = "default_dataset_ledger")]
    pub dataset_ledger: Account,
    #[serde(default = "default_model_ledger")]
    pub model_ledger: Account,
    #[serde(default = "default_authenticator")]
    pub output_authenticator: Account,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default = "default_domain_version")]
    pub domain_version: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_log: bool,
}

fn default_chain_id() -> u64 { 31337 }
fn default_owner() -> Account { DEV_OWNER }
fn default_dataset_ledger() -> Account { DEV_DATASET_LEDGER }
fn default_model_ledger() -> Account { DEV_MODEL_LEDGER }
fn default_authenticator() -> Account { DEV_AUTHENTICATOR }
fn default_domain_name() -> String { "OutputAuthenticator".into() }
fn default_domain_version() -> String { "1".into() }
fn default_log_level() -> String { "info".into() }

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            owner: default_owner(),
            dataset_ledger: default_dataset_ledger(),
            model_ledger: default_model_ledger(),
            output_authenticator: default_authenticator(),
            domain_name: default_domain_name(),
            domain_version: default_domain_version(),
            log_level: default_log_level(),
            json_log: false,
        }
    }
}

impl LedgerConfig {
    /// Receipt signing domain bound to the authenticator instance.
    pub fn signing_domain(&self) -> SigningDomain {
        SigningDomain::new(self.domain_name.clone(), self.domain_version.clone(), self.chain_id, self.output_authenticator)
    }
}

pub fn load_config() -> Result<LedgerConfig> {
    let file = std::env::var(CONFIG_FILE_ENV).ok();
    load_config_from(file.as_deref())
}

pub fn load_config_from(file: Option<&str>) -> Result<LedgerConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg: LedgerConfig = builder.build()?.try_deserialize()?;
    tracing::debug!(chain_id = cfg.chain_id, owner = %cfg.owner, "ledger config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_sources() {
        let cfg = load_config_from(None).unwrap();
        assert_eq!(cfg.domain_version, "1");
        assert_ne!(cfg.output_authenticator, cfg.model_ledger);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("provenance-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ledger.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "chain_id: 11155111").unwrap();
        writeln!(f, "owner: \"0x{}\"", "42".repeat(20)).unwrap();
        let cfg = load_config_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.chain_id, 11155111);
        assert_eq!(cfg.owner, Account([0x42; 20]));
        assert_eq!(cfg.signing_domain().chain_id, 11155111);
    }
}
