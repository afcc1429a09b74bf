//! Ledger metric groups. Instruments come from the global OpenTelemetry meter
//! and are no-ops until a meter provider is installed.

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;

pub struct LedgerMetrics {
    pub ops_applied_total: Counter<u64>,
    pub ops_rejected_total: Counter<u64>,
    pub transactions_total: Counter<u64>,
    pub anchoring_total: Counter<u64>,
    pub receipt_verifications_total: Counter<u64>,
}

static LEDGER_METER: Lazy<Meter> = Lazy::new(|| opentelemetry::global::meter("provenance_ledger"));

pub static LEDGER_METRICS: Lazy<LedgerMetrics> = Lazy::new(|| LedgerMetrics {
    ops_applied_total: LEDGER_METER
        .u64_counter("provenance_ops_applied_total")
        .with_description("Mutating ledger operations applied inside a transaction")
        .build(),
    ops_rejected_total: LEDGER_METER
        .u64_counter("provenance_ops_rejected_total")
        .with_description("Mutating ledger operations aborted, by error kind")
        .build(),
    transactions_total: LEDGER_METER
        .u64_counter("provenance_transactions_total")
        .with_description("Transactions by outcome (committed or rolled_back)")
        .build(),
    anchoring_total: LEDGER_METER
        .u64_counter("provenance_anchoring_total")
        .with_description("Cross-ledger anchoring attempts by outcome and tier")
        .build(),
    receipt_verifications_total: LEDGER_METER
        .u64_counter("provenance_receipt_verifications_total")
        .with_description("Receipt verifications by verdict")
        .build(),
});

pub fn record_applied(op: &'static str) {
    LEDGER_METRICS.ops_applied_total.add(1, &[KeyValue::new("op", op)]);
}

pub fn record_transaction(committed: bool) {
    let outcome = if committed { "committed" } else { "rolled_back" };
    LEDGER_METRICS.transactions_total.add(1, &[KeyValue::new("outcome", outcome)]);
}

pub fn record_rejected(op: &'static str, kind: &'static str) {
    LEDGER_METRICS.ops_rejected_total.add(1, &[KeyValue::new("op", op), KeyValue::new("kind", kind)]);
}

pub fn record_anchoring(success: bool, tier: &'static str) {
    LEDGER_METRICS.anchoring_total.add(1, &[KeyValue::new("success", success), KeyValue::new("tier", tier)]);
}

pub fn record_receipt_verdict(verdict: &'static str) {
    LEDGER_METRICS.receipt_verifications_total.add(1, &[KeyValue::new("verdict", verdict)]);
}
