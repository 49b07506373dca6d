//! Invariant audit.
//!
//! Recomputes the pool's accounting identities from stored state and lists
//! every breach. Rounding dust left by floor payouts is reported per round
//! but is not a violation.

use crate::pool::claim;
use crate::pool::engine::PoolEngine;
use crate::pool::history::MetricSource;
use crate::pool::ledger::ValueLedger;
use crate::pool::round::Round;
use crate::pool::types::{Amount, CycleId, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCheck {
    /// Σ account stakes == side totals.
    Conservation,
    VoidImpliesResolved,
    IncentivesWithinPot,
    UnresolvedPayoutsZero,
    PaidWithinDistributable,
    CustodyCoversLiabilities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditViolation {
    pub check: AuditCheck,
    pub cycle_id: Option<CycleId>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResidual {
    pub cycle_id: CycleId,
    /// Distributable value no winner can ever claim.
    pub residual: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub rounds_checked: usize,
    /// Value custody still owes: open pots, unclaimed refunds and winnings.
    pub liabilities: Amount,
    pub custody_balance: Amount,
    pub residuals: Vec<RoundResidual>,
    pub violations: Vec<AuditViolation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn total_residual(&self) -> Amount {
        self.residuals.iter().map(|r| r.residual).sum()
    }

    fn flag(&mut self, check: AuditCheck, cycle_id: Option<CycleId>, detail: String) {
        tracing::warn!(?check, ?cycle_id, %detail, "Audit violation");
        self.violations.push(AuditViolation {
            check,
            cycle_id,
            detail,
        });
    }
}

impl<L: ValueLedger, M: MetricSource> PoolEngine<L, M> {
    pub fn audit(&self) -> AuditReport {
        let mut report = AuditReport::default();
        for round in self.registry.iter() {
            report.rounds_checked += 1;
            self.audit_round(round, &mut report);
        }

        let custody = self.ledger.custody().clone();
        report.custody_balance = self.ledger.balance_of(&custody);
        if report.custody_balance < report.liabilities {
            let detail = format!(
                "custody holds {} but owes {}",
                report.custody_balance, report.liabilities
            );
            report.flag(AuditCheck::CustodyCoversLiabilities, None, detail);
        }
        report
    }

    fn audit_round(&self, round: &Round, report: &mut AuditReport) {
        let cycle_id = round.cycle_id();
        let some_id = Some(cycle_id);
        let pot = round.pot();
        let paid = self.claims.paid_out(cycle_id);

        if round.is_voided() && !round.is_resolved() {
            report.flag(
                AuditCheck::VoidImpliesResolved,
                some_id,
                "voided round is not resolved".to_string(),
            );
        }
        let incentives = round.bounty_paid().saturating_add(round.protocol_fee_paid());
        if incentives > pot {
            report.flag(
                AuditCheck::IncentivesWithinPot,
                some_id,
                format!("incentives {} exceed pot {}", incentives, pot),
            );
        }

        let mut remaining = [0 as Amount; 2];
        let mut outstanding: Amount = 0;
        for (account, position) in self.stakes.positions_in(cycle_id) {
            remaining[0] += position.stake_a;
            remaining[1] += position.stake_b;
            if round.is_resolved() && !self.claims.is_claimed(cycle_id, account) {
                if let Ok(q) = claim::quote(round, *position) {
                    outstanding += q.amount;
                }
            }
        }

        if !round.is_resolved() {
            if incentives != 0 || round.winning_side().is_some() || round.settled_at().is_some() {
                report.flag(
                    AuditCheck::UnresolvedPayoutsZero,
                    some_id,
                    "unresolved round carries settlement fields".to_string(),
                );
            }
            for (i, side) in Side::BOTH.into_iter().enumerate() {
                if remaining[i] != round.total_stake(side) {
                    report.flag(
                        AuditCheck::Conservation,
                        some_id,
                        format!(
                            "side {} stakes sum to {} but total is {}",
                            side,
                            remaining[i],
                            round.total_stake(side)
                        ),
                    );
                }
            }
            report.liabilities += pot;
            return;
        }

        if round.is_voided() {
            // Refunds clear both sides, so unclaimed stakes plus refunds paid
            // must add back up to the pot.
            let unclaimed = remaining[0] + remaining[1];
            if unclaimed + paid != pot {
                report.flag(
                    AuditCheck::Conservation,
                    some_id,
                    format!("refunded {} + unclaimed {} != pot {}", paid, unclaimed, pot),
                );
            }
            report.liabilities += outstanding;
            return;
        }

        let distributable = round.distributable();
        if paid > distributable {
            report.flag(
                AuditCheck::PaidWithinDistributable,
                some_id,
                format!("paid {} exceeds distributable {}", paid, distributable),
            );
        }
        report.liabilities += outstanding;
        let residual = distributable.saturating_sub(paid.saturating_add(outstanding));
        if residual > 0 {
            report.residuals.push(RoundResidual { cycle_id, residual });
        }
    }
}
