use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use provenance_core::{init_tracing, load_config};
use provenance_ledger::{LedgerHandle, ProvenanceChain, SystemClock};

fn main() -> Result<()> {
    let config = load_config().context("loading ledger configuration")?;
    init_tracing("provenance-ledger", &config.log_level, config.json_log)?;
    info!(target: "provenance-ledger", chain_id = config.chain_id, "Starting provenance-ledger host");

    let chain = ProvenanceChain::genesis(&config).context("genesis failed")?;
    let handle = LedgerHandle::new(chain, Arc::new(SystemClock));
    let summary = handle.summary();
    info!(target: "provenance-ledger", domain_separator = %summary.domain_separator, "ledger ready");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
