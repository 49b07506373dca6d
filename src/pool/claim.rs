//! Claim Processor
//!
//! Pays each (round, account) at most once. A voided round refunds both
//! sides of the position; a normal round pays the winning-side stake's share
//! of the distributable pot:
//!
//! ```text
//! payout = floor(distributable * stake_on_winner / total_on_winner)
//! ```
//!
//! Floor division never overpays. The remainder (under one unit per winner)
//! stays in custody.

use crate::pool::error::EngineError;
use crate::pool::ledger::ValueLedger;
use crate::pool::round::{Round, RoundRegistry};
use crate::pool::stake::{Position, StakeLedger};
use crate::pool::types::{AccountId, Amount, CycleId, Side};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// Full stake back from a voided round.
    Refund,
    /// Share of the distributable pot.
    Winnings,
}

/// What a claim on one round would pay, before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimQuote {
    pub cycle_id: CycleId,
    pub kind: ClaimKind,
    pub amount: Amount,
}

impl ClaimQuote {
    /// Sides of the position zeroed once the quote is paid.
    fn cleared_sides(&self, round: &Round) -> Vec<Side> {
        match (self.kind, round.winning_side()) {
            (ClaimKind::Winnings, Some(winner)) => vec![winner],
            _ => Side::BOTH.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchClaimReceipt {
    pub account: AccountId,
    pub claims: Vec<ClaimQuote>,
    pub total: Amount,
}

/// `floor(a * b / c)` without intermediate overflow for realistic inputs.
pub fn mul_div_floor(a: Amount, b: Amount, c: Amount) -> Amount {
    if c == 0 {
        return 0;
    }
    match a.checked_mul(b) {
        Some(product) => product / c,
        None => (a / c)
            .saturating_mul(b)
            .saturating_add((a % c).saturating_mul(b) / c),
    }
}

/// Price a claim against a resolved round. Does not look at claim flags.
///
/// A winning stake too small to earn one unit is `NothingToClaim`; the
/// position stays put and no flag is set.
pub fn quote(round: &Round, position: Position) -> Result<ClaimQuote, EngineError> {
    let cycle_id = round.cycle_id();
    if !round.is_resolved() {
        return Err(EngineError::TooEarly {
            cycle_id,
            ready_at: None,
        });
    }

    match round.winning_side() {
        None => {
            let amount = position.total();
            if amount == 0 {
                return Err(EngineError::NoStake { cycle_id });
            }
            Ok(ClaimQuote {
                cycle_id,
                kind: ClaimKind::Refund,
                amount,
            })
        }
        Some(winner) => {
            let stake = position.on(winner);
            if stake == 0 {
                return Err(EngineError::NotAWinner { cycle_id });
            }
            let amount = mul_div_floor(round.distributable(), stake, round.total_stake(winner));
            if amount == 0 {
                return Err(EngineError::NothingToClaim);
            }
            Ok(ClaimQuote {
                cycle_id,
                kind: ClaimKind::Winnings,
                amount,
            })
        }
    }
}

// =============================================================================
// CLAIM BOOK
// =============================================================================

/// Claim flags plus per-round payout totals.
#[derive(Debug, Clone, Default)]
pub struct ClaimProcessor {
    claimed: HashSet<(CycleId, AccountId)>,
    paid_by_round: HashMap<CycleId, Amount>,
}

impl ClaimProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, cycle_id: CycleId, account: &AccountId) -> bool {
        self.claimed.contains(&(cycle_id, account.clone()))
    }

    /// Total paid out of a round so far (winnings or refunds).
    pub fn paid_out(&self, cycle_id: CycleId) -> Amount {
        self.paid_by_round.get(&cycle_id).copied().unwrap_or(0)
    }

    /// Flag the claim and zero the position; returns what to restore if the
    /// payout transfer is refused.
    fn commit(
        &mut self,
        round: &Round,
        stakes: &mut StakeLedger,
        account: &AccountId,
        quote: &ClaimQuote,
    ) -> Position {
        let before = stakes.position(quote.cycle_id, account);
        self.claimed.insert((quote.cycle_id, account.clone()));
        stakes.clear(quote.cycle_id, account, &quote.cleared_sides(round));
        *self.paid_by_round.entry(quote.cycle_id).or_insert(0) += quote.amount;
        before
    }

    fn rollback(
        &mut self,
        stakes: &mut StakeLedger,
        account: &AccountId,
        quote: &ClaimQuote,
        before: Position,
    ) {
        self.claimed.remove(&(quote.cycle_id, account.clone()));
        stakes.restore(quote.cycle_id, account, before);
        if let Some(paid) = self.paid_by_round.get_mut(&quote.cycle_id) {
            *paid -= quote.amount;
        }
    }

    /// Claim one round. The flag is set before value moves; a refused
    /// transfer undoes it.
    pub fn claim<L: ValueLedger>(
        &mut self,
        round: &Round,
        stakes: &mut StakeLedger,
        account: &AccountId,
        ledger: &mut L,
    ) -> Result<ClaimQuote, EngineError> {
        let cycle_id = round.cycle_id();
        if !round.is_resolved() {
            return Err(EngineError::TooEarly {
                cycle_id,
                ready_at: None,
            });
        }
        if self.is_claimed(cycle_id, account) {
            return Err(EngineError::AlreadyClaimed { cycle_id });
        }
        let quote = quote(round, stakes.position(cycle_id, account))?;

        let before = self.commit(round, stakes, account, &quote);
        if let Err(e) = ledger.transfer_out(account, quote.amount) {
            self.rollback(stakes, account, &quote, before);
            return Err(e.into());
        }
        Ok(quote)
    }

    /// Claim every payable round in `cycle_ids` with one transfer.
    ///
    /// Rounds a single `claim` would reject (unresolved, already claimed,
    /// losing or zero-payout) are skipped without touching their flags; only
    /// an empty total is an error.
    pub fn claim_batch<L: ValueLedger>(
        &mut self,
        registry: &RoundRegistry,
        stakes: &mut StakeLedger,
        cycle_ids: &[CycleId],
        account: &AccountId,
        ledger: &mut L,
    ) -> Result<BatchClaimReceipt, EngineError> {
        let mut seen = HashSet::new();
        let mut claims = Vec::new();
        for &cycle_id in cycle_ids {
            if !seen.insert(cycle_id) || self.is_claimed(cycle_id, account) {
                continue;
            }
            let Some(round) = registry.get(cycle_id) else {
                continue;
            };
            match quote(round, stakes.position(cycle_id, account)) {
                Ok(q) => claims.push((round, q)),
                Err(e) => tracing::trace!(
                    cycle_id,
                    %account,
                    reason = %e,
                    "Skipping round in batch claim"
                ),
            }
        }

        let total: Amount = claims.iter().map(|(_, q)| q.amount).sum();
        if total == 0 {
            return Err(EngineError::NothingToClaim);
        }

        let restore: Vec<Position> = claims
            .iter()
            .map(|(round, q)| self.commit(round, stakes, account, q))
            .collect();
        if let Err(e) = ledger.transfer_out(account, total) {
            for ((_, q), before) in claims.iter().zip(restore) {
                self.rollback(stakes, account, q, before);
            }
            return Err(e.into());
        }

        Ok(BatchClaimReceipt {
            account: account.clone(),
            claims: claims.into_iter().map(|(_, q)| q).collect(),
            total,
        })
    }
}
