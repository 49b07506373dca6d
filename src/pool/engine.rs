//! Pool Engine
//!
//! Facade over the registry, stake ledger, settlement, claim book and stats.
//! Every operation takes `&mut self` and runs to completion, which gives the
//! whole-operation atomicity the components rely on. All timing comes in as
//! an explicit `now`.

use crate::pool::claim::{BatchClaimReceipt, ClaimKind, ClaimProcessor, ClaimQuote};
use crate::pool::config::{ConfigError, EngineConfig};
use crate::pool::error::EngineError;
use crate::pool::events::{EngineEvent, EventLog};
use crate::pool::history::MetricSource;
use crate::pool::ledger::ValueLedger;
use crate::pool::round::RoundRegistry;
use crate::pool::settlement::{SettlementEngine, SettlementOutcome, SettlementReport};
use crate::pool::stake::{StakeLedger, StakeReceipt};
use crate::pool::stats::StatsAggregator;
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};

pub struct PoolEngine<L: ValueLedger, M: MetricSource> {
    pub(crate) config: EngineConfig,
    pub(crate) registry: RoundRegistry,
    pub(crate) stakes: StakeLedger,
    pub(crate) claims: ClaimProcessor,
    pub(crate) stats: StatsAggregator,
    settlement: SettlementEngine,
    events: EventLog,
    pub(crate) ledger: L,
    source: M,
}

impl<L: ValueLedger, M: MetricSource> PoolEngine<L, M> {
    /// Validate `config` and ask the source for enough history.
    pub fn new(config: EngineConfig, ledger: L, mut source: M) -> Result<Self, ConfigError> {
        let settlement = SettlementEngine::new(&config)?;
        source.ensure_history_depth(config.min_history_depth as usize);
        tracing::info!(
            staking_window_secs = config.staking_window_secs,
            prediction_window_secs = config.prediction_window_secs,
            samples = settlement.plan().samples(),
            bounty_bps = config.bounty_bps,
            fee_bps = config.fee_bps,
            custody = %ledger.custody(),
            "Pool engine ready"
        );
        Ok(Self {
            registry: RoundRegistry::new(config.clone()),
            stakes: StakeLedger::new(),
            claims: ClaimProcessor::new(),
            stats: StatsAggregator::new(),
            settlement,
            events: EventLog::new(),
            config,
            ledger,
            source,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut M {
        &mut self.source
    }

    pub fn events(&self) -> &[EngineEvent] {
        self.events.as_slice()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    // =========================================================================
    // STAKING
    // =========================================================================

    pub fn add_stake(
        &mut self,
        now: UnixSecs,
        cycle_id: CycleId,
        account: &AccountId,
        side: Side,
        amount: Amount,
    ) -> Result<StakeReceipt, EngineError> {
        let round = self.registry.get_or_init(cycle_id, &mut self.events);
        let receipt = self
            .stakes
            .add_stake(round, account, side, amount, now, &mut self.ledger)?;

        self.stats.record_stake(&receipt);
        tracing::debug!(
            cycle_id,
            account = %account,
            side = %side,
            amount = %amount,
            side_total = %receipt.side_total,
            "Stake added"
        );
        self.events.push(EngineEvent::StakeAdded {
            cycle_id,
            account: account.clone(),
            side,
            amount,
            side_total: receipt.side_total,
        });
        Ok(receipt)
    }

    pub fn retract_stake(
        &mut self,
        now: UnixSecs,
        cycle_id: CycleId,
        account: &AccountId,
        side: Side,
        amount: Amount,
    ) -> Result<StakeReceipt, EngineError> {
        let round = self.registry.get_or_init(cycle_id, &mut self.events);
        let receipt = self
            .stakes
            .retract_stake(round, account, side, amount, now, &mut self.ledger)?;

        self.stats.record_retract(&receipt);
        tracing::debug!(
            cycle_id,
            account = %account,
            side = %side,
            amount = %amount,
            side_total = %receipt.side_total,
            "Stake retracted"
        );
        self.events.push(EngineEvent::StakeRetracted {
            cycle_id,
            account: account.clone(),
            side,
            amount,
            side_total: receipt.side_total,
        });
        Ok(receipt)
    }

    // =========================================================================
    // SETTLEMENT
    // =========================================================================

    /// Permissionless; the first successful call per round has effect.
    pub fn settle(
        &mut self,
        now: UnixSecs,
        cycle_id: CycleId,
        keeper: &AccountId,
    ) -> Result<SettlementReport, EngineError> {
        let round = self.registry.get_or_init(cycle_id, &mut self.events);
        let report = self
            .settlement
            .settle(round, keeper, now, &self.source, &mut self.ledger)?;

        self.stats.record_settlement(&report);
        self.events.push(match &report.outcome {
            SettlementOutcome::Settled {
                winner,
                metric_a,
                metric_b,
                bounty,
                protocol_fee,
                ..
            } => EngineEvent::RoundSettled {
                cycle_id,
                winning_side: *winner,
                metric_a: *metric_a,
                metric_b: *metric_b,
                keeper: keeper.clone(),
                bounty: *bounty,
                protocol_fee: *protocol_fee,
                settled_at: now,
            },
            SettlementOutcome::Voided {
                reason,
                metric_a,
                metric_b,
            } => EngineEvent::RoundVoided {
                cycle_id,
                reason: reason.clone(),
                metric_a: *metric_a,
                metric_b: *metric_b,
                settled_at: now,
            },
        });
        Ok(report)
    }

    // =========================================================================
    // CLAIMS
    // =========================================================================

    pub fn claim(
        &mut self,
        cycle_id: CycleId,
        account: &AccountId,
    ) -> Result<ClaimQuote, EngineError> {
        let Some(round) = self.registry.get(cycle_id) else {
            return Err(EngineError::TooEarly {
                cycle_id,
                ready_at: None,
            });
        };
        let quote = self
            .claims
            .claim(round, &mut self.stakes, account, &mut self.ledger)?;

        self.stats.record_claim(account, &quote);
        let refund = quote.kind == ClaimKind::Refund;
        tracing::info!(
            cycle_id,
            account = %account,
            amount = %quote.amount,
            refund,
            "Payout claimed"
        );
        self.events.push(EngineEvent::Claimed {
            cycle_id,
            account: account.clone(),
            amount: quote.amount,
            refund,
        });
        Ok(quote)
    }

    /// Claim every payable round in `cycle_ids` with a single transfer.
    pub fn claim_batch(
        &mut self,
        cycle_ids: &[CycleId],
        account: &AccountId,
    ) -> Result<BatchClaimReceipt, EngineError> {
        let receipt = self.claims.claim_batch(
            &self.registry,
            &mut self.stakes,
            cycle_ids,
            account,
            &mut self.ledger,
        )?;

        for quote in &receipt.claims {
            self.stats.record_claim(account, quote);
            self.events.push(EngineEvent::Claimed {
                cycle_id: quote.cycle_id,
                account: account.clone(),
                amount: quote.amount,
                refund: quote.kind == ClaimKind::Refund,
            });
        }
        tracing::info!(
            account = %account,
            rounds = receipt.claims.len(),
            requested = cycle_ids.len(),
            total = %receipt.total,
            "Batch claimed"
        );
        self.events.push(EngineEvent::BatchClaimed {
            account: account.clone(),
            cycle_ids: receipt.claims.iter().map(|q| q.cycle_id).collect(),
            total: receipt.total,
        });
        Ok(receipt)
    }
}
