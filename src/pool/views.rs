//! Read surface for presentation layers.
//!
//! Pure projections over stored state. Unseen cycles read as the zeroed
//! round first touch would create, without storing it.

use crate::pool::claim::{self, ClaimKind, ClaimQuote};
use crate::pool::engine::PoolEngine;
use crate::pool::error::EngineError;
use crate::pool::events::VoidReason;
use crate::pool::history::MetricSource;
use crate::pool::ledger::ValueLedger;
use crate::pool::round::{Phase, Round};
use crate::pool::stake::Position;
use crate::pool::stats::{GlobalStats, UserStats};
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use serde::{Deserialize, Serialize};

/// A round with its derived phase and pot figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub cycle_id: CycleId,
    pub start_time: UnixSecs,
    pub staking_end_time: UnixSecs,
    pub window_end_time: UnixSecs,
    pub phase: Phase,
    /// `add_stake` would pass the window check at `now`.
    pub accepting_stakes: bool,
    pub resolved: bool,
    pub voided: bool,
    pub winning_side: Option<Side>,
    pub void_reason: Option<VoidReason>,
    pub metric_a: u128,
    pub metric_b: u128,
    pub total_stake_a: Amount,
    pub total_stake_b: Amount,
    pub pot: Amount,
    pub bounty_paid: Amount,
    pub protocol_fee_paid: Amount,
    pub distributable: Amount,
    pub settled_at: Option<UnixSecs>,
}

impl RoundView {
    pub fn new(round: &Round, now: UnixSecs, finality_delay_secs: u64) -> Self {
        Self {
            cycle_id: round.cycle_id(),
            start_time: round.start_time(),
            staking_end_time: round.staking_end_time(),
            window_end_time: round.window_end_time(),
            phase: round.phase(now, finality_delay_secs),
            accepting_stakes: round.accepts_stakes(now),
            resolved: round.is_resolved(),
            voided: round.is_voided(),
            winning_side: round.winning_side(),
            void_reason: round.void_reason().cloned(),
            metric_a: round.metric_a(),
            metric_b: round.metric_b(),
            total_stake_a: round.total_stake(Side::A),
            total_stake_b: round.total_stake(Side::B),
            pot: round.pot(),
            bounty_paid: round.bounty_paid(),
            protocol_fee_paid: round.protocol_fee_paid(),
            distributable: round.distributable(),
            settled_at: round.settled_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableRound {
    pub cycle_id: CycleId,
    pub kind: ClaimKind,
    pub amount: Amount,
}

impl<L: ValueLedger, M: MetricSource> PoolEngine<L, M> {
    pub fn current_cycle(&self, now: UnixSecs) -> CycleId {
        self.config.cycle_at(now)
    }

    /// Stored round or its zeroed projection.
    pub fn round(&self, cycle_id: CycleId) -> Round {
        self.registry.project(cycle_id)
    }

    pub fn rounds(&self, cycle_ids: &[CycleId]) -> Vec<Round> {
        cycle_ids.iter().map(|&id| self.round(id)).collect()
    }

    pub fn round_view(&self, now: UnixSecs, cycle_id: CycleId) -> RoundView {
        RoundView::new(&self.round(cycle_id), now, self.config.finality_delay_secs)
    }

    pub fn phase(&self, cycle_id: CycleId, now: UnixSecs) -> Phase {
        self.round(cycle_id)
            .phase(now, self.config.finality_delay_secs)
    }

    /// Up to `count` rounds, newest first, starting at the current cycle.
    pub fn recent_rounds(&self, now: UnixSecs, count: usize) -> Vec<RoundView> {
        let current = self.current_cycle(now);
        (0..=current)
            .rev()
            .take(count)
            .map(|id| self.round_view(now, id))
            .collect()
    }

    pub fn stake_of(&self, cycle_id: CycleId, account: &AccountId) -> Position {
        self.stakes.position(cycle_id, account)
    }

    /// What `claim` would pay right now, without paying it.
    pub fn preview_claim(
        &self,
        cycle_id: CycleId,
        account: &AccountId,
    ) -> Result<ClaimQuote, EngineError> {
        let round = self.round(cycle_id);
        if round.is_resolved() && self.claims.is_claimed(cycle_id, account) {
            return Err(EngineError::AlreadyClaimed { cycle_id });
        }
        claim::quote(&round, self.stakes.position(cycle_id, account))
    }

    /// Resolved, unclaimed rounds with a non-zero payout for `account`,
    /// scanning back `lookback` cycles (config default when `None`), newest
    /// first.
    pub fn claimable_rounds(
        &self,
        account: &AccountId,
        now: UnixSecs,
        lookback: Option<u64>,
    ) -> Vec<ClaimableRound> {
        let lookback = lookback.unwrap_or(self.config.claim_lookback_cycles);
        let current = self.current_cycle(now);
        let oldest = current.saturating_sub(lookback);
        (oldest..=current)
            .rev()
            .filter_map(|cycle_id| {
                let round = self.registry.get(cycle_id)?;
                if !round.is_resolved() || self.claims.is_claimed(cycle_id, account) {
                    return None;
                }
                let quote = claim::quote(round, self.stakes.position(cycle_id, account)).ok()?;
                Some(ClaimableRound {
                    cycle_id,
                    kind: quote.kind,
                    amount: quote.amount,
                })
            })
            .collect()
    }

    pub fn user_stats(&self, account: &AccountId) -> UserStats {
        self.stats.user(account)
    }

    pub fn global_stats(&self) -> GlobalStats {
        self.stats.global()
    }
}
