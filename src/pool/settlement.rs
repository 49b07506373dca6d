//! Settlement Engine
//!
//! The one transition a round undergoes after its window closes. Checks run
//! in a fixed order:
//!
//! 1. already resolved: `AlreadySettled`
//! 2. before `window_end + finality`: `TooEarly`
//! 3. past `window_end + finality + resolve_deadline`: void, zero metrics
//! 4. either asset's series unavailable: void, zero metrics
//! 5. metrics decide the winner ([`TIE_WINNER`](crate::pool::metric::TIE_WINNER) on equality)
//! 6. nobody staked on the winner: void, metrics kept
//! 7. otherwise pay the keeper bounty and protocol fee, freeze the economics
//!
//! Paths 3, 4 and 6 always terminate the round, so a pot can never be left
//! unsettled. Voids pay no incentives.

use crate::pool::config::{ConfigError, ConfigViolation, EngineConfig};
use crate::pool::error::{EngineError, ObservationError, TransferError};
use crate::pool::events::VoidReason;
use crate::pool::history::MetricSource;
use crate::pool::ledger::ValueLedger;
use crate::pool::metric::{MetricOutcome, SamplingPlan};
use crate::pool::round::{bps_of, Round};
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use serde::{Deserialize, Serialize};

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled {
        winner: Side,
        metric_a: u128,
        metric_b: u128,
        is_tie: bool,
        bounty: Amount,
        protocol_fee: Amount,
    },
    Voided {
        reason: VoidReason,
        metric_a: u128,
        metric_b: u128,
    },
}

/// What a successful `settle` did to the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub cycle_id: CycleId,
    pub keeper: AccountId,
    pub settled_at: UnixSecs,
    pub pot: Amount,
    pub outcome: SettlementOutcome,
}

impl SettlementReport {
    pub fn is_void(&self) -> bool {
        matches!(self.outcome, SettlementOutcome::Voided { .. })
    }

    pub fn winner(&self) -> Option<Side> {
        match self.outcome {
            SettlementOutcome::Settled { winner, .. } => Some(winner),
            SettlementOutcome::Voided { .. } => None,
        }
    }

    /// Bounty plus fee moved out of custody.
    pub fn incentives_paid(&self) -> (Amount, Amount) {
        match self.outcome {
            SettlementOutcome::Settled {
                bounty,
                protocol_fee,
                ..
            } => (bounty, protocol_fee),
            SettlementOutcome::Voided { .. } => (0, 0),
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Debug, Clone)]
pub struct SettlementEngine {
    plan: SamplingPlan,
    finality_delay_secs: u64,
    resolve_deadline_secs: u64,
    bounty_bps: u16,
    fee_bps: u16,
    fee_recipient: Option<AccountId>,
}

impl SettlementEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let plan = config.sampling_plan().ok_or_else(|| {
            ConfigError::Invalid(vec![ConfigViolation::new(
                "sampling_step_secs",
                "No sampling plan for the prediction window",
                "Choose a step that divides prediction_window_secs at least twice",
            )])
        })?;
        Ok(Self {
            plan,
            finality_delay_secs: config.finality_delay_secs,
            resolve_deadline_secs: config.resolve_deadline_secs,
            bounty_bps: config.bounty_bps,
            fee_bps: config.fee_bps,
            fee_recipient: config.fee_recipient(),
        })
    }

    pub fn plan(&self) -> &SamplingPlan {
        &self.plan
    }

    /// Last second at which settlement still measures instead of voiding.
    pub fn deadline(&self, round: &Round) -> UnixSecs {
        round
            .settleable_at(self.finality_delay_secs)
            .saturating_add(self.resolve_deadline_secs)
    }

    /// `(bounty, fee)` for a pot. The fee is zero without a recipient.
    pub fn incentives(&self, pot: Amount) -> (Amount, Amount) {
        let bounty = bps_of(pot, self.bounty_bps);
        let fee = if self.fee_recipient.is_some() {
            bps_of(pot, self.fee_bps)
        } else {
            0
        };
        (bounty, fee)
    }

    fn fetch_series<M: MetricSource>(
        &self,
        source: &M,
        asset: Side,
        round: &Round,
        now: UnixSecs,
    ) -> Result<Vec<i128>, ObservationError> {
        let seconds_agos = self.plan.seconds_agos(round.staking_end_time(), now);
        let series = source.observe(asset, now, &seconds_agos)?;
        if series.len() != self.plan.points() {
            return Err(ObservationError::Malformed {
                asset,
                expected: self.plan.points(),
                actual: series.len(),
            });
        }
        Ok(series)
    }

    fn void(
        round: &mut Round,
        reason: VoidReason,
        metric_a: u128,
        metric_b: u128,
        keeper: &AccountId,
        now: UnixSecs,
    ) -> SettlementReport {
        let pot = round.pot();
        round.void(reason.clone(), metric_a, metric_b, keeper.clone(), now);
        SettlementReport {
            cycle_id: round.cycle_id(),
            keeper: keeper.clone(),
            settled_at: now,
            pot,
            outcome: SettlementOutcome::Voided {
                reason,
                metric_a,
                metric_b,
            },
        }
    }

    /// Settle `round` on behalf of `keeper`.
    ///
    /// Source failures never surface here; they void the round. Only a
    /// refused incentive transfer fails after the timing checks, and then the
    /// round is left untouched.
    pub fn settle<M: MetricSource, L: ValueLedger>(
        &self,
        round: &mut Round,
        keeper: &AccountId,
        now: UnixSecs,
        source: &M,
        ledger: &mut L,
    ) -> Result<SettlementReport, EngineError> {
        let cycle_id = round.cycle_id();
        if round.is_resolved() {
            return Err(EngineError::AlreadySettled { cycle_id });
        }
        let ready_at = round.settleable_at(self.finality_delay_secs);
        if now < ready_at {
            return Err(EngineError::TooEarly {
                cycle_id,
                ready_at: Some(ready_at),
            });
        }
        if keeper.is_empty() || keeper == ledger.custody() {
            return Err(TransferError::InvalidAccount {
                account: keeper.clone(),
            }
            .into());
        }

        let deadline = self.deadline(round);
        if now > deadline {
            tracing::warn!(
                cycle_id,
                now,
                deadline,
                pot = %round.pot(),
                "Settlement past resolve deadline, voiding round"
            );
            return Ok(Self::void(
                round,
                VoidReason::DeadlineExceeded,
                0,
                0,
                keeper,
                now,
            ));
        }

        let mut series = Vec::with_capacity(2);
        for asset in Side::BOTH {
            match self.fetch_series(source, asset, round, now) {
                Ok(s) => series.push(s),
                Err(e) => {
                    tracing::warn!(
                        cycle_id,
                        asset = %asset,
                        error = %e,
                        "Observation unavailable, voiding round"
                    );
                    let reason = VoidReason::ObservationUnavailable {
                        asset,
                        detail: e.to_string(),
                    };
                    return Ok(Self::void(round, reason, 0, 0, keeper, now));
                }
            }
        }
        let outcome = MetricOutcome::from_series(&series[0], &series[1], &self.plan);

        if round.total_stake(outcome.winner) == 0 {
            tracing::info!(
                cycle_id,
                winner = %outcome.winner,
                metric_a = %outcome.metric_a,
                metric_b = %outcome.metric_b,
                "No stake on winning side, voiding round"
            );
            let reason = VoidReason::NoWinningStake {
                would_have_won: outcome.winner,
            };
            return Ok(Self::void(
                round,
                reason,
                outcome.metric_a,
                outcome.metric_b,
                keeper,
                now,
            ));
        }

        let pot = round.pot();
        let (bounty, fee) = self.incentives(pot);
        self.pay_incentives(ledger, keeper, bounty, fee)?;

        round.resolve(&outcome, bounty, fee, keeper.clone(), now);
        tracing::info!(
            cycle_id,
            winner = %outcome.winner,
            tie = outcome.is_tie,
            metric_a = %outcome.metric_a,
            metric_b = %outcome.metric_b,
            pot = %pot,
            bounty = %bounty,
            fee = %fee,
            keeper = %keeper,
            "Round settled"
        );

        Ok(SettlementReport {
            cycle_id,
            keeper: keeper.clone(),
            settled_at: now,
            pot,
            outcome: SettlementOutcome::Settled {
                winner: outcome.winner,
                metric_a: outcome.metric_a,
                metric_b: outcome.metric_b,
                is_tie: outcome.is_tie,
                bounty,
                protocol_fee: fee,
            },
        })
    }

    /// Pay bounty then fee. Either both land or neither does.
    fn pay_incentives<L: ValueLedger>(
        &self,
        ledger: &mut L,
        keeper: &AccountId,
        bounty: Amount,
        fee: Amount,
    ) -> Result<(), EngineError> {
        let needed = bounty.saturating_add(fee);
        let custody = ledger.custody().clone();
        let available = ledger.balance_of(&custody);
        if available < needed {
            return Err(TransferError::InsufficientFunds {
                account: custody,
                needed,
                available,
            }
            .into());
        }

        if bounty > 0 {
            ledger.transfer_out(keeper, bounty)?;
        }
        if let (Some(recipient), true) = (&self.fee_recipient, fee > 0) {
            if let Err(e) = ledger.transfer_out(recipient, fee) {
                if bounty > 0 {
                    if let Err(undo) = ledger.transfer_in(keeper, bounty) {
                        tracing::error!(
                            keeper = %keeper,
                            bounty = %bounty,
                            error = %undo,
                            "Could not reclaim bounty after fee transfer failed"
                        );
                    }
                }
                return Err(e.into());
            }
        }
        Ok(())
    }
}
