//! Per-operation execution context and the ledger clock.

use std::sync::atomic::{AtomicU64, Ordering};

use provenance_core::{Account, Timestamp};

/// What the execution environment hands every operation: who is calling, the
/// replica-agreed time of the enclosing step, and the chain identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Account,
    pub now: Timestamp,
    pub chain_id: u64,
}

impl CallContext {
    pub fn new(caller: Account, now: Timestamp, chain_id: u64) -> Self {
        Self { caller, now, chain_id }
    }

    /// Same step, different caller. Used when one component calls another.
    pub fn as_caller(&self, caller: Account) -> Self {
        Self { caller, ..*self }
    }
}

/// Coarse time source; whole seconds only.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Clock driven by hand, for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(AtomicU64::new(start))
    }

    pub fn set(&self, t: Timestamp) {
        self.0.store(t, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) -> Timestamp {
        self.0.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let c = ManualClock::new(100);
        assert_eq!(c.advance(5), 105);
        assert_eq!(c.now(), 105);
        c.set(7);
        assert_eq!(c.now(), 7);
    }

    #[test]
    fn as_caller_keeps_time_and_chain() {
        let ctx = CallContext::new(Account([1; 20]), 50, 9);
        let inner = ctx.as_caller(Account([2; 20]));
        assert_eq!((inner.now, inner.chain_id), (50, 9));
        assert_eq!(inner.caller, Account([2; 20]));
    }
}
