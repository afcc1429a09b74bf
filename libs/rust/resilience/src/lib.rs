//! Ordered fallback chains.
//!
//! A chain is a list of named tiers tried in order against a shared context.
//! Each tier returns a `Result`; the first `Ok` short-circuits and later tiers
//! never run. Failures are collected, not raised, so the caller decides whether
//! an exhausted chain aborts or is merely reported.
use once_cell::sync::Lazy;
use opentelemetry::{global, metrics::Counter, KeyValue};
use std::fmt;
use thiserror::Error;
use tracing::debug;

static TIER_ATTEMPTS: Lazy<Counter<u64>> = Lazy::new(|| {
    global::meter("provenance-resilience")
        .u64_counter("provenance_fallback_tier_attempts_total")
        .with_description("Fallback tiers executed, by chain and outcome")
        .build()
});

#[derive(Debug, Error, PartialEq, Eq)]
#[error("fallback chain `{chain}` exhausted after {attempts} tier(s)")]
pub struct ChainExhausted {
    pub chain: &'static str,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFailure<E> {
    pub tier: &'static str,
    pub error: E,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChainOutcome<T, E> {
    Resolved { tier: &'static str, value: T, failures: Vec<TierFailure<E>> },
    Exhausted { failures: Vec<TierFailure<E>> },
}

impl<T, E> ChainOutcome<T, E> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ChainOutcome::Resolved { .. })
    }

    pub fn tier(&self) -> Option<&'static str> {
        match self {
            ChainOutcome::Resolved { tier, .. } => Some(tier),
            ChainOutcome::Exhausted { .. } => None,
        }
    }

    pub fn failures(&self) -> &[TierFailure<E>] {
        match self {
            ChainOutcome::Resolved { failures, .. } | ChainOutcome::Exhausted { failures } => failures,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            ChainOutcome::Resolved { value, .. } => Some(value),
            ChainOutcome::Exhausted { .. } => None,
        }
    }
}

pub struct AttemptChain<'a, C: ?Sized, T, E> {
    name: &'static str,
    tiers: Vec<(&'static str, Box<dyn FnOnce(&mut C) -> Result<T, E> + 'a>)>,
}

impl<'a, C: ?Sized, T, E: fmt::Debug> AttemptChain<'a, C, T, E> {
    pub fn new(name: &'static str) -> Self {
        Self { name, tiers: Vec::new() }
    }

    pub fn then<F>(mut self, tier: &'static str, f: F) -> Self
    where
        F: FnOnce(&mut C) -> Result<T, E> + 'a,
    {
        self.tiers.push((tier, Box::new(f)));
        self
    }

    pub fn run(self, ctx: &mut C) -> ChainOutcome<T, E> {
        let mut failures = Vec::new();
        for (tier, attempt) in self.tiers {
            match attempt(&mut *ctx) {
                Ok(value) => {
                    TIER_ATTEMPTS.add(1, &[KeyValue::new("chain", self.name), KeyValue::new("outcome", "ok")]);
                    return ChainOutcome::Resolved { tier, value, failures };
                }
                Err(error) => {
                    TIER_ATTEMPTS.add(1, &[KeyValue::new("chain", self.name), KeyValue::new("outcome", "err")]);
                    debug!(chain = self.name, tier, ?error, "fallback tier failed");
                    failures.push(TierFailure { tier, error });
                }
            }
        }
        ChainOutcome::Exhausted { failures }
    }

    /// Like [`run`](Self::run) but turns exhaustion into an error.
    pub fn resolve(self, ctx: &mut C) -> Result<(&'static str, T), ChainExhausted> {
        let chain = self.name;
        match self.run(ctx) {
            ChainOutcome::Resolved { tier, value, .. } => Ok((tier, value)),
            ChainOutcome::Exhausted { failures } => Err(ChainExhausted { chain, attempts: failures.len() }),
        }
    }
}
