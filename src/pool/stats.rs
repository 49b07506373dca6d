//! Running totals derived from staking, settlement and claims.
//!
//! Counters only grow. Nothing outside the engine's stake, settle and claim
//! paths writes them.

use crate::pool::claim::{ClaimKind, ClaimQuote};
use crate::pool::settlement::SettlementReport;
use crate::pool::stake::StakeReceipt;
use crate::pool::types::{AccountId, Amount, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub wagered: Amount,
    pub retracted: Amount,
    /// Winnings from normal rounds; refunds are not counted.
    pub won: Amount,
    pub refunded: Amount,
    pub rounds_played: u64,
    pub rounds_won: u64,
}

impl UserStats {
    /// `rounds_won / rounds_played` in basis points; zero with no rounds.
    pub fn win_rate_bps(&self) -> u64 {
        if self.rounds_played == 0 {
            return 0;
        }
        let bps = u128::from(self.rounds_won) * BPS_DENOMINATOR / u128::from(self.rounds_played);
        bps as u64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_volume: Amount,
    pub total_retracted: Amount,
    /// Winnings plus refunds.
    pub total_paid_out: Amount,
    pub total_bounties: Amount,
    pub total_fees: Amount,
    /// Rounds settled with a winner.
    pub rounds_resolved: u64,
    pub rounds_voided: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    users: HashMap<AccountId, UserStats>,
    global: GlobalStats,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_mut(&mut self, account: &AccountId) -> &mut UserStats {
        self.users.entry(account.clone()).or_default()
    }

    pub fn record_stake(&mut self, receipt: &StakeReceipt) {
        let user = self.user_mut(&receipt.account);
        user.wagered = user.wagered.saturating_add(receipt.amount);
        if receipt.first_in_round {
            user.rounds_played += 1;
        }
        self.global.total_volume = self.global.total_volume.saturating_add(receipt.amount);
    }

    pub fn record_retract(&mut self, receipt: &StakeReceipt) {
        let user = self.user_mut(&receipt.account);
        user.retracted = user.retracted.saturating_add(receipt.amount);
        self.global.total_retracted = self.global.total_retracted.saturating_add(receipt.amount);
    }

    pub fn record_claim(&mut self, account: &AccountId, quote: &ClaimQuote) {
        let user = self.user_mut(account);
        match quote.kind {
            ClaimKind::Winnings => {
                user.won = user.won.saturating_add(quote.amount);
                user.rounds_won += 1;
            }
            ClaimKind::Refund => {
                user.refunded = user.refunded.saturating_add(quote.amount);
            }
        }
        self.global.total_paid_out = self.global.total_paid_out.saturating_add(quote.amount);
    }

    pub fn record_settlement(&mut self, report: &SettlementReport) {
        if report.is_void() {
            self.global.rounds_voided += 1;
            return;
        }
        let (bounty, fee) = report.incentives_paid();
        self.global.total_bounties = self.global.total_bounties.saturating_add(bounty);
        self.global.total_fees = self.global.total_fees.saturating_add(fee);
        self.global.rounds_resolved += 1;
    }

    /// Zeroed stats for accounts never seen.
    pub fn user(&self, account: &AccountId) -> UserStats {
        self.users.get(account).copied().unwrap_or_default()
    }

    pub fn global(&self) -> GlobalStats {
        self.global
    }

    pub fn accounts(&self) -> usize {
        self.users.len()
    }
}
