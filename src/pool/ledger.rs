//! Value Ledger
//!
//! The fungible-value collaborator. The engine only ever pulls value from an
//! account into custody and pushes value from custody to an account. A
//! failing transfer must not move anything.

use crate::pool::error::TransferError;
use crate::pool::types::{AccountId, Amount};
use std::collections::HashMap;

/// Moves value between accounts and the pool's custody account.
pub trait ValueLedger: Send {
    /// Pull `amount` from `from` into custody.
    fn transfer_in(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError>;

    /// Push `amount` from custody to `to`.
    fn transfer_out(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError>;

    fn balance_of(&self, account: &AccountId) -> Amount;

    /// Account that holds staked value.
    fn custody(&self) -> &AccountId;
}

// =============================================================================
// IN-MEMORY LEDGER
// =============================================================================

/// Balance map with a single custody account.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    custody: AccountId,
    balances: HashMap<AccountId, Amount>,
    /// Total value created with [`InMemoryLedger::mint`].
    minted: Amount,
    transfer_count: u64,
}

impl InMemoryLedger {
    pub fn new(custody: AccountId) -> Self {
        Self {
            custody,
            balances: HashMap::new(),
            minted: 0,
            transfer_count: 0,
        }
    }

    /// Credit an account out of thin air (funding test and simulated users).
    pub fn mint(&mut self, account: &AccountId, amount: Amount) {
        *self.balances.entry(account.clone()).or_insert(0) += amount;
        self.minted = self.minted.saturating_add(amount);
    }

    pub fn total_minted(&self) -> Amount {
        self.minted
    }

    /// Sum of every balance; equals `total_minted` since transfers only move value.
    pub fn total_supply(&self) -> Amount {
        self.balances.values().copied().sum()
    }

    pub fn transfer_count(&self) -> u64 {
        self.transfer_count
    }

    fn move_value(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount);
        }
        for account in [from, to] {
            if account.is_empty() {
                return Err(TransferError::InvalidAccount {
                    account: account.clone(),
                });
            }
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.clone(),
                needed: amount,
                available,
            });
        }

        // Checked above; both writes happen or neither.
        *self.balances.entry(from.clone()).or_insert(0) -= amount;
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        self.transfer_count += 1;
        Ok(())
    }
}

impl ValueLedger for InMemoryLedger {
    fn transfer_in(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let custody = self.custody.clone();
        self.move_value(from, &custody, amount)
    }

    fn transfer_out(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let custody = self.custody.clone();
        self.move_value(&custody, to, amount)
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn custody(&self) -> &AccountId {
        &self.custody
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (InMemoryLedger, AccountId) {
        let mut ledger = InMemoryLedger::new(AccountId::new("custody"));
        let alice = AccountId::new("alice");
        ledger.mint(&alice, 100);
        (ledger, alice)
    }

    #[test]
    fn test_transfer_roundtrip() {
        let (mut ledger, alice) = ledger();
        ledger.transfer_in(&alice, 60).unwrap();
        assert_eq!(ledger.balance_of(&alice), 40);
        assert_eq!(ledger.balance_of(ledger.custody()), 60);

        ledger.transfer_out(&alice, 25).unwrap();
        assert_eq!(ledger.balance_of(&alice), 65);
        assert_eq!(ledger.total_supply(), ledger.total_minted());
        assert_eq!(ledger.transfer_count(), 2);
    }

    #[test]
    fn test_overdraft_moves_nothing() {
        let (mut ledger, alice) = ledger();
        let err = ledger.transfer_in(&alice, 101).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientFunds {
                needed: 101,
                available: 100,
                ..
            }
        ));
        assert_eq!(ledger.balance_of(&alice), 100);
        assert_eq!(ledger.transfer_count(), 0);
    }

    #[test]
    fn test_zero_and_empty_rejected() {
        let (mut ledger, alice) = ledger();
        assert_eq!(ledger.transfer_in(&alice, 0), Err(TransferError::ZeroAmount));
        assert!(matches!(
            ledger.transfer_out(&AccountId::new("  "), 1),
            Err(TransferError::InvalidAccount { .. })
        ));
    }
}
