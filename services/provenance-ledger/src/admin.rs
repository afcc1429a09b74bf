//! Owner and pause flag held by each ledger component.

use serde::{Deserialize, Serialize};

use provenance_core::{Account, LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminControl {
    owner: Account,
    paused: bool,
}

impl AdminControl {
    pub fn new(owner: Account) -> Self {
        Self { owner, paused: false }
    }

    pub fn owner(&self) -> Account {
        self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ensure_owner(&self, caller: &Account) -> LedgerResult<()> {
        if *caller != self.owner {
            return Err(LedgerError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    /// Guard at the entry of every mutating operation.
    pub fn ensure_active(&self) -> LedgerResult<()> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    /// Returns the previous owner.
    pub fn transfer_ownership(&mut self, caller: &Account, new_owner: Account) -> LedgerResult<Account> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(LedgerError::InvalidOwner(new_owner));
        }
        let previous = self.owner;
        self.owner = new_owner;
        Ok(previous)
    }

    pub fn set_paused(&mut self, caller: &Account, paused: bool) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.paused = paused;
        Ok(())
    }
}
