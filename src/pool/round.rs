//! Round Registry
//!
//! Holds one [`Round`] per cycle ordinal. Boundaries are a pure function of
//! the ordinal and the window lengths:
//!
//! ```text
//! start_time       = cycle_id * CYCLE_DURATION
//! staking_end_time = start_time + STAKING_WINDOW
//! window_end_time  = start_time + CYCLE_DURATION
//! ```
//!
//! Rounds are materialized on first touch and never removed. Only the stake
//! totals (during staking) and the settlement fields (once) ever change.
//! Phase is never stored; [`Round::phase`] derives it from `now`.

use crate::pool::config::EngineConfig;
use crate::pool::events::{EngineEvent, EventLog, VoidReason};
use crate::pool::metric::MetricOutcome;
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

// =============================================================================
// PHASE
// =============================================================================

/// Lifecycle phase, ordered: it never decreases as `now` grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// `now < staking_end_time`. Also covers a round whose `start_time` is
    /// still ahead; see `Round::accepts_stakes` for the open window.
    Staking,
    /// `staking_end_time <= now < window_end_time`
    Measuring,
    /// `window_end_time <= now < window_end_time + finality_delay`
    Finality,
    /// Past finality and not yet resolved.
    Settleable,
    /// Resolved (terminal).
    Settled,
}

// =============================================================================
// ROUND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    cycle_id: CycleId,
    start_time: UnixSecs,
    staking_end_time: UnixSecs,
    window_end_time: UnixSecs,

    resolved: bool,
    voided: bool,
    winning_side: Option<Side>,
    void_reason: Option<VoidReason>,
    metric_a: u128,
    metric_b: u128,

    total_stake_a: Amount,
    total_stake_b: Amount,

    bounty_paid: Amount,
    protocol_fee_paid: Amount,
    settled_at: Option<UnixSecs>,
    settled_by: Option<AccountId>,
}

impl Round {
    /// Zeroed round for `cycle_id`. Deterministic: two calls with the same
    /// inputs yield equal records.
    pub fn fresh(cycle_id: CycleId, config: &EngineConfig) -> Self {
        let start_time = cycle_id.saturating_mul(config.cycle_duration_secs());
        Self {
            cycle_id,
            start_time,
            staking_end_time: start_time.saturating_add(config.staking_window_secs),
            window_end_time: start_time.saturating_add(config.cycle_duration_secs()),
            resolved: false,
            voided: false,
            winning_side: None,
            void_reason: None,
            metric_a: 0,
            metric_b: 0,
            total_stake_a: 0,
            total_stake_b: 0,
            bounty_paid: 0,
            protocol_fee_paid: 0,
            settled_at: None,
            settled_by: None,
        }
    }

    pub fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }
    pub fn start_time(&self) -> UnixSecs {
        self.start_time
    }
    pub fn staking_end_time(&self) -> UnixSecs {
        self.staking_end_time
    }
    pub fn window_end_time(&self) -> UnixSecs {
        self.window_end_time
    }
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
    pub fn is_voided(&self) -> bool {
        self.voided
    }
    /// `Some` only for resolved, non-void rounds.
    pub fn winning_side(&self) -> Option<Side> {
        self.winning_side
    }
    pub fn void_reason(&self) -> Option<&VoidReason> {
        self.void_reason.as_ref()
    }
    pub fn metric_a(&self) -> u128 {
        self.metric_a
    }
    pub fn metric_b(&self) -> u128 {
        self.metric_b
    }
    pub fn bounty_paid(&self) -> Amount {
        self.bounty_paid
    }
    pub fn protocol_fee_paid(&self) -> Amount {
        self.protocol_fee_paid
    }
    pub fn settled_at(&self) -> Option<UnixSecs> {
        self.settled_at
    }
    pub fn settled_by(&self) -> Option<&AccountId> {
        self.settled_by.as_ref()
    }

    pub fn total_stake(&self, side: Side) -> Amount {
        match side {
            Side::A => self.total_stake_a,
            Side::B => self.total_stake_b,
        }
    }

    pub fn pot(&self) -> Amount {
        self.total_stake_a.saturating_add(self.total_stake_b)
    }

    /// Pot minus incentives; what winners split.
    pub fn distributable(&self) -> Amount {
        self.pot()
            .saturating_sub(self.bounty_paid)
            .saturating_sub(self.protocol_fee_paid)
    }

    /// Earliest time settlement is allowed.
    pub fn settleable_at(&self, finality_delay_secs: u64) -> UnixSecs {
        self.window_end_time.saturating_add(finality_delay_secs)
    }

    /// `start_time <= now < staking_end_time`
    pub fn accepts_stakes(&self, now: UnixSecs) -> bool {
        self.start_time <= now && now < self.staking_end_time
    }

    pub fn phase(&self, now: UnixSecs, finality_delay_secs: u64) -> Phase {
        if self.resolved {
            Phase::Settled
        } else if now < self.staking_end_time {
            Phase::Staking
        } else if now < self.window_end_time {
            Phase::Measuring
        } else if now < self.settleable_at(finality_delay_secs) {
            Phase::Finality
        } else {
            Phase::Settleable
        }
    }

    // -------------------------------------------------------------------------
    // Mutations (crate-private; each owned by one component)
    // -------------------------------------------------------------------------

    fn side_total_mut(&mut self, side: Side) -> &mut Amount {
        match side {
            Side::A => &mut self.total_stake_a,
            Side::B => &mut self.total_stake_b,
        }
    }

    /// Stake ledger only.
    pub(crate) fn credit_side(&mut self, side: Side, amount: Amount) -> Amount {
        let total = self.side_total_mut(side);
        *total = total.saturating_add(amount);
        *total
    }

    /// Stake ledger only. Callers check the account's stake first, so the
    /// side total always covers `amount`.
    pub(crate) fn debit_side(&mut self, side: Side, amount: Amount) -> Amount {
        let total = self.side_total_mut(side);
        debug_assert!(*total >= amount, "side total below account stake");
        *total = total.saturating_sub(amount);
        *total
    }

    /// Settlement only: normal resolution with incentives paid.
    pub(crate) fn resolve(
        &mut self,
        outcome: &MetricOutcome,
        bounty: Amount,
        protocol_fee: Amount,
        keeper: AccountId,
        now: UnixSecs,
    ) {
        debug_assert!(!self.resolved, "round resolved twice");
        self.resolved = true;
        self.voided = false;
        self.winning_side = Some(outcome.winner);
        self.metric_a = outcome.metric_a;
        self.metric_b = outcome.metric_b;
        self.bounty_paid = bounty;
        self.protocol_fee_paid = protocol_fee;
        self.settled_at = Some(now);
        self.settled_by = Some(keeper);
    }

    /// Settlement only: resolve without a winner. Nothing is paid out.
    pub(crate) fn void(
        &mut self,
        reason: VoidReason,
        metric_a: u128,
        metric_b: u128,
        keeper: AccountId,
        now: UnixSecs,
    ) {
        debug_assert!(!self.resolved, "round resolved twice");
        self.resolved = true;
        self.voided = true;
        self.winning_side = None;
        self.void_reason = Some(reason);
        self.metric_a = metric_a;
        self.metric_b = metric_b;
        self.settled_at = Some(now);
        self.settled_by = Some(keeper);
    }
}

/// `pot * bps / 10_000`, floored.
pub fn bps_of(pot: Amount, bps: u16) -> Amount {
    pot.saturating_mul(u128::from(bps)) / BPS_DENOMINATOR
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Arena of rounds keyed by cycle ordinal.
#[derive(Debug, Clone)]
pub struct RoundRegistry {
    config: EngineConfig,
    rounds: BTreeMap<CycleId, Round>,
}

impl RoundRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            rounds: BTreeMap::new(),
        }
    }

    /// Stored round, or insert a zeroed one and emit `RoundOpened`.
    ///
    /// Check and insert happen through a single map entry, so a known id is
    /// never re-initialized.
    pub fn get_or_init(&mut self, cycle_id: CycleId, events: &mut EventLog) -> &mut Round {
        match self.rounds.entry(cycle_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let round = Round::fresh(cycle_id, &self.config);
                tracing::info!(
                    cycle_id,
                    start_time = round.start_time,
                    staking_end_time = round.staking_end_time,
                    window_end_time = round.window_end_time,
                    "Round opened"
                );
                events.push(EngineEvent::RoundOpened {
                    cycle_id,
                    start_time: round.start_time,
                    staking_end_time: round.staking_end_time,
                    window_end_time: round.window_end_time,
                });
                entry.insert(round)
            }
        }
    }

    pub fn get(&self, cycle_id: CycleId) -> Option<&Round> {
        self.rounds.get(&cycle_id)
    }

    /// Stored round or the deterministic zeroed projection, without storing.
    pub fn project(&self, cycle_id: CycleId) -> Round {
        self.rounds
            .get(&cycle_id)
            .cloned()
            .unwrap_or_else(|| Round::fresh(cycle_id, &self.config))
    }

    pub fn contains(&self, cycle_id: CycleId) -> bool {
        self.rounds.contains_key(&cycle_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
