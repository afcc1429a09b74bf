//! Undo records for the transaction in flight.
//!
//! While a transaction is open each component appends the inverse of every
//! write it makes. Rollback replays them newest first and cuts the event log
//! back to where the transaction began; commit forgets them. Nothing is
//! recorded outside a transaction.

#[derive(Debug, Clone)]
pub struct Journal<U> {
    /// Event log length when the transaction began; `None` when closed.
    event_mark: Option<usize>,
    entries: Vec<U>,
}

impl<U> Default for Journal<U> {
    fn default() -> Self {
        Self { event_mark: None, entries: Vec::new() }
    }
}

impl<U> Journal<U> {
    pub fn begin(&mut self, event_mark: usize) {
        self.event_mark = Some(event_mark);
        self.entries.clear();
    }

    pub fn is_open(&self) -> bool {
        self.event_mark.is_some()
    }

    pub fn record(&mut self, undo: U) {
        if self.is_open() {
            self.entries.push(undo);
        }
    }

    pub fn commit(&mut self) {
        self.event_mark = None;
        self.entries.clear();
    }

    /// Closes the transaction and hands back its undo entries, newest first.
    pub fn unwind(&mut self) -> Option<(usize, Vec<U>)> {
        let mark = self.event_mark.take()?;
        let mut entries = std::mem::take(&mut self.entries);
        entries.reverse();
        Some((mark, entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A component that can take part in an all-or-nothing transaction.
pub trait Transactional {
    fn begin(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);
}
