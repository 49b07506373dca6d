//! Stake Ledger
//!
//! Per-(round, account) stake on each side. Side totals live on the
//! [`Round`] and move only through this ledger, so at all times
//!
//! ```text
//! Σ_accounts stake(round, account, side) == round.total_stake(side)
//! ```
//!
//! until claims start zeroing individual positions after settlement.

use crate::pool::error::EngineError;
use crate::pool::ledger::ValueLedger;
use crate::pool::round::Round;
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An account's stake in one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub stake_a: Amount,
    pub stake_b: Amount,
}

impl Position {
    pub fn on(&self, side: Side) -> Amount {
        match side {
            Side::A => self.stake_a,
            Side::B => self.stake_b,
        }
    }

    pub fn total(&self) -> Amount {
        self.stake_a.saturating_add(self.stake_b)
    }

    fn on_mut(&mut self, side: Side) -> &mut Amount {
        match side {
            Side::A => &mut self.stake_a,
            Side::B => &mut self.stake_b,
        }
    }
}

/// Result of a stake change, fed to stats and the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub cycle_id: CycleId,
    pub account: AccountId,
    pub side: Side,
    pub amount: Amount,
    pub position: Position,
    pub side_total: Amount,
    /// First stake by this account in this round (either side).
    pub first_in_round: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StakeLedger {
    positions: HashMap<(CycleId, AccountId), Position>,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_window(round: &Round, now: UnixSecs) -> Result<(), EngineError> {
        if now < round.start_time() {
            return Err(EngineError::RoundNotOpen {
                cycle_id: round.cycle_id(),
                start_time: round.start_time(),
            });
        }
        if now >= round.staking_end_time() {
            return Err(EngineError::WindowClosed {
                cycle_id: round.cycle_id(),
                staking_end_time: round.staking_end_time(),
            });
        }
        Ok(())
    }

    /// Pull `amount` from `account` and record it on `side`.
    pub fn add_stake<L: ValueLedger>(
        &mut self,
        round: &mut Round,
        account: &AccountId,
        side: Side,
        amount: Amount,
        now: UnixSecs,
        ledger: &mut L,
    ) -> Result<StakeReceipt, EngineError> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        Self::check_window(round, now)?;

        ledger.transfer_in(account, amount)?;

        let key = (round.cycle_id(), account.clone());
        let first_in_round = !self.positions.contains_key(&key);
        let position = self.positions.entry(key).or_default();
        let stake = position.on_mut(side);
        *stake = stake.saturating_add(amount);
        let position = *position;
        let side_total = round.credit_side(side, amount);

        Ok(StakeReceipt {
            cycle_id: round.cycle_id(),
            account: account.clone(),
            side,
            amount,
            position,
            side_total,
            first_in_round,
        })
    }

    /// Return `amount` of the account's `side` stake while staking is open.
    pub fn retract_stake<L: ValueLedger>(
        &mut self,
        round: &mut Round,
        account: &AccountId,
        side: Side,
        amount: Amount,
        now: UnixSecs,
        ledger: &mut L,
    ) -> Result<StakeReceipt, EngineError> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        Self::check_window(round, now)?;

        let key = (round.cycle_id(), account.clone());
        let available = self.positions.get(&key).map(|p| p.on(side)).unwrap_or(0);
        if amount > available {
            return Err(EngineError::InsufficientStake {
                cycle_id: round.cycle_id(),
                side,
                requested: amount,
                available,
            });
        }

        ledger.transfer_out(account, amount)?;

        let position = self.positions.entry(key).or_default();
        *position.on_mut(side) -= amount;
        let position = *position;
        let side_total = round.debit_side(side, amount);

        Ok(StakeReceipt {
            cycle_id: round.cycle_id(),
            account: account.clone(),
            side,
            amount,
            position,
            side_total,
            first_in_round: false,
        })
    }

    pub fn position(&self, cycle_id: CycleId, account: &AccountId) -> Position {
        self.positions
            .get(&(cycle_id, account.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Whether the account ever staked in the round.
    pub fn has_entered(&self, cycle_id: CycleId, account: &AccountId) -> bool {
        self.positions.contains_key(&(cycle_id, account.clone()))
    }

    /// Claim processor only: zero the given sides after a payout.
    pub(crate) fn clear(&mut self, cycle_id: CycleId, account: &AccountId, sides: &[Side]) {
        if let Some(position) = self.positions.get_mut(&(cycle_id, account.clone())) {
            for &side in sides {
                *position.on_mut(side) = 0;
            }
        }
    }

    /// Claim processor only: put back a position cleared by a payout the
    /// ledger then refused.
    pub(crate) fn restore(&mut self, cycle_id: CycleId, account: &AccountId, position: Position) {
        self.positions.insert((cycle_id, account.clone()), position);
    }

    /// Every position recorded for a round.
    pub fn positions_in(&self, cycle_id: CycleId) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.positions
            .iter()
            .filter(move |((cycle, _), _)| *cycle == cycle_id)
            .map(|((_, account), position)| (account, position))
    }
}
