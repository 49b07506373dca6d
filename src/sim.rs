//! Deterministic pool simulation.
//!
//! Drives a [`PoolEngine`] over a run of consecutive cycles with a seeded
//! `ChaCha8Rng`: two random-walk tick series (asset A wilder than asset B),
//! stakers placing and occasionally retracting stakes during each staking
//! window, keepers settling at a jittered time (sometimes past the resolve
//! deadline), and a final batch claim per staker.
//!
//! All actions are scheduled up front and replayed in `(time, seq)` order on
//! a [`SimClock`]; the same seed always produces the same summary.

use crate::pool::audit::AuditReport;
use crate::pool::clock::SimClock;
use crate::pool::config::EngineConfig;
use crate::pool::engine::PoolEngine;
use crate::pool::events::{EngineEvent, VoidReason};
use crate::pool::history::TickHistory;
use crate::pool::ledger::{InMemoryLedger, ValueLedger};
use crate::pool::stats::{GlobalStats, UserStats};
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub cycles: u64,
    pub stakers: usize,
    pub seed: u64,
    /// Simulation starts at the first cycle boundary after this time.
    pub start_time: UnixSecs,
    pub initial_balance: Amount,
    pub max_stake: Amount,
    /// Chance a staker enters a given round.
    pub participation: f64,
    /// Chance a stake is partly retracted before the window closes.
    pub retract_probability: f64,
    /// Chance the keeper shows up after the resolve deadline.
    pub late_settle_probability: f64,
    pub keepers: usize,
    pub tick_interval_secs: u64,
    /// Max tick move per interval for asset A and asset B.
    pub volatility_a: i64,
    pub volatility_b: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles: 24,
            stakers: 8,
            seed: 42,
            start_time: 1_769_212_800, // 2026-01-24T00:00:00Z
            initial_balance: 1_000_000,
            max_stake: 5_000,
            participation: 0.7,
            retract_probability: 0.1,
            late_settle_probability: 0.05,
            keepers: 3,
            tick_interval_secs: 30,
            volatility_a: 40,
            volatility_b: 25,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("participation", self.participation),
            ("retract_probability", self.retract_probability),
            ("late_settle_probability", self.late_settle_probability),
        ] {
            anyhow::ensure!((0.0..=1.0).contains(&p), "{} must be within [0, 1], got {}", name, p);
        }
        anyhow::ensure!(self.cycles > 0, "cycles must be positive");
        anyhow::ensure!(self.tick_interval_secs > 0, "tick_interval_secs must be positive");
        Ok(())
    }
}

// =============================================================================
// SUMMARY
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub first_cycle: CycleId,
    pub cycles: u64,
    pub stakers: usize,
    pub started_at: String,
    pub finished_at: String,
    pub stakes_placed: u64,
    pub stakes_rejected: u64,
    pub retractions: u64,
    pub rounds_settled: u64,
    pub rounds_voided: u64,
    pub wins_by_side: BTreeMap<String, u64>,
    pub void_reasons: BTreeMap<String, u64>,
    pub batch_claims: u64,
    pub events_emitted: usize,
    pub global: GlobalStats,
    pub users: BTreeMap<String, UserStats>,
    pub supply_conserved: bool,
    pub audit: AuditReport,
}

// =============================================================================
// SCHEDULE
// =============================================================================

#[derive(Debug, Clone)]
enum Action {
    Stake {
        cycle_id: CycleId,
        staker: usize,
        side: Side,
        amount: Amount,
    },
    Retract {
        cycle_id: CycleId,
        staker: usize,
        side: Side,
        amount: Amount,
    },
    Settle {
        cycle_id: CycleId,
        keeper: usize,
    },
    ClaimAll {
        staker: usize,
    },
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: UnixSecs,
    seq: u64,
    action: Action,
}

fn staker_id(i: usize) -> AccountId {
    AccountId::new(format!("staker-{:02}", i))
}

fn keeper_id(i: usize) -> AccountId {
    AccountId::new(format!("keeper-{}", i))
}

/// Bounded random walk for one asset's tick.
#[derive(Debug, Clone, Copy)]
struct TickWalk {
    tick: i64,
    volatility: i64,
}

impl TickWalk {
    fn step(&mut self, rng: &mut ChaCha8Rng) -> i64 {
        let vol = self.volatility.max(1);
        self.tick = (self.tick + rng.gen_range(-vol..=vol)).clamp(-50 * vol, 50 * vol);
        self.tick
    }
}

struct Simulation {
    sim: SimulationConfig,
    rng: ChaCha8Rng,
    clock: SimClock,
    engine: PoolEngine<InMemoryLedger, TickHistory>,
    walks: [TickWalk; 2],
    next_tick_at: UnixSecs,
    summary: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    stakes_placed: u64,
    stakes_rejected: u64,
    retractions: u64,
    batch_claims: u64,
}

impl Simulation {
    fn schedule(&mut self, first_cycle: CycleId) -> Vec<Scheduled> {
        let mut plan = Vec::new();
        let mut seq = 0u64;
        let mut push = |plan: &mut Vec<Scheduled>, at: UnixSecs, action: Action| {
            plan.push(Scheduled { at, seq, action });
            seq += 1;
        };

        let mut last_settle = 0;
        for cycle_id in first_cycle..first_cycle + self.sim.cycles {
            let round = self.engine.round(cycle_id);
            let (start, staking_end) = (round.start_time(), round.staking_end_time());
            let config = self.engine.config();
            let settleable = round.settleable_at(config.finality_delay_secs);
            let deadline = settleable + config.resolve_deadline_secs;

            for staker in 0..self.sim.stakers {
                if !self.rng.gen_bool(self.sim.participation) {
                    continue;
                }
                let at = self.rng.gen_range(start..staking_end);
                let side = if self.rng.gen_bool(0.5) { Side::A } else { Side::B };
                let amount = self.rng.gen_range(1..=self.sim.max_stake.max(1));
                push(
                    &mut plan,
                    at,
                    Action::Stake {
                        cycle_id,
                        staker,
                        side,
                        amount,
                    },
                );

                if self.rng.gen_bool(self.sim.retract_probability) && at + 1 < staking_end {
                    let retract_at = self.rng.gen_range(at + 1..staking_end);
                    let part = (amount / 2).max(1);
                    push(
                        &mut plan,
                        retract_at,
                        Action::Retract {
                            cycle_id,
                            staker,
                            side,
                            amount: part,
                        },
                    );
                }
            }

            let settle_at = if self.rng.gen_bool(self.sim.late_settle_probability) {
                deadline + 1 + self.rng.gen_range(0..600)
            } else {
                settleable + self.rng.gen_range(0..120)
            };
            let keeper = self.rng.gen_range(0..self.sim.keepers.max(1));
            push(&mut plan, settle_at, Action::Settle { cycle_id, keeper });
            last_settle = last_settle.max(settle_at);
        }

        for staker in 0..self.sim.stakers {
            push(&mut plan, last_settle + 1, Action::ClaimAll { staker });
        }

        plan.sort_by_key(|s| (s.at, s.seq));
        plan
    }

    /// Record ticks for both assets at every interval boundary up to `until`.
    fn advance_ticks(&mut self, until: UnixSecs) {
        let interval = self.sim.tick_interval_secs.max(1);
        while self.next_tick_at <= until {
            for (i, asset) in Side::BOTH.into_iter().enumerate() {
                let tick = self.walks[i].step(&mut self.rng);
                self.engine
                    .source_mut()
                    .record(asset, self.next_tick_at, tick);
            }
            self.next_tick_at += interval;
        }
    }

    fn execute(&mut self, item: &Scheduled, first_cycle: CycleId) {
        let now = item.at;
        match item.action {
            Action::Stake {
                cycle_id,
                staker,
                side,
                amount,
            } => {
                match self.engine.add_stake(now, cycle_id, &staker_id(staker), side, amount) {
                    Ok(_) => self.summary.stakes_placed += 1,
                    Err(e) => {
                        tracing::debug!(cycle_id, staker, error = %e, "Stake rejected");
                        self.summary.stakes_rejected += 1;
                    }
                }
            }
            Action::Retract {
                cycle_id,
                staker,
                side,
                amount,
            } => {
                if self
                    .engine
                    .retract_stake(now, cycle_id, &staker_id(staker), side, amount)
                    .is_ok()
                {
                    self.summary.retractions += 1;
                }
            }
            Action::Settle { cycle_id, keeper } => {
                if let Err(e) = self.engine.settle(now, cycle_id, &keeper_id(keeper)) {
                    tracing::warn!(cycle_id, error = %e, "Settlement failed");
                }
            }
            Action::ClaimAll { staker } => {
                let account = staker_id(staker);
                let lookback = self.engine.current_cycle(now).saturating_sub(first_cycle);
                let ids: Vec<CycleId> = self
                    .engine
                    .claimable_rounds(&account, now, Some(lookback))
                    .iter()
                    .map(|c| c.cycle_id)
                    .collect();
                if ids.is_empty() {
                    return;
                }
                match self.engine.claim_batch(&ids, &account) {
                    Ok(_) => self.summary.batch_claims += 1,
                    Err(e) => tracing::warn!(%account, error = %e, "Batch claim failed"),
                }
            }
        }
    }
}

/// Run a full simulated session and summarize it.
pub fn run_simulation(config: EngineConfig, sim: SimulationConfig) -> Result<SimulationSummary> {
    sim.validate()?;
    let mut ledger = InMemoryLedger::new(config.custody());
    for i in 0..sim.stakers {
        ledger.mint(&staker_id(i), sim.initial_balance);
    }
    let history = TickHistory::new(config.min_history_depth as usize);
    let engine = PoolEngine::new(config, ledger, history).context("Invalid engine config")?;

    let first_cycle = engine.current_cycle(sim.start_time) + 1;
    let first_start = engine.round(first_cycle).start_time();
    tracing::info!(
        seed = sim.seed,
        cycles = sim.cycles,
        stakers = sim.stakers,
        first_cycle,
        "Starting simulation"
    );

    let mut run = Simulation {
        rng: ChaCha8Rng::seed_from_u64(sim.seed),
        clock: SimClock::new(first_start),
        walks: [
            TickWalk {
                tick: 0,
                volatility: sim.volatility_a,
            },
            TickWalk {
                tick: 0,
                volatility: sim.volatility_b,
            },
        ],
        next_tick_at: first_start,
        engine,
        sim,
        summary: Counters::default(),
    };

    let started_at = run.clock.to_string();
    let plan = run.schedule(first_cycle);
    for item in &plan {
        run.advance_ticks(item.at);
        run.clock.advance_to(item.at.max(run.clock.now()));
        run.execute(item, first_cycle);
    }

    Ok(summarize(run, first_cycle, started_at))
}

fn summarize(run: Simulation, first_cycle: CycleId, started_at: String) -> SimulationSummary {
    let engine = &run.engine;
    let mut wins_by_side = BTreeMap::new();
    let mut void_reasons = BTreeMap::new();
    let (mut settled, mut voided) = (0, 0);
    for event in engine.events() {
        match event {
            EngineEvent::RoundSettled { winning_side, .. } => {
                settled += 1;
                *wins_by_side.entry(winning_side.to_string()).or_insert(0) += 1;
            }
            EngineEvent::RoundVoided { reason, .. } => {
                voided += 1;
                let key = match reason {
                    VoidReason::DeadlineExceeded => "deadline_exceeded",
                    VoidReason::ObservationUnavailable { .. } => "observation_unavailable",
                    VoidReason::NoWinningStake { .. } => "no_winning_stake",
                };
                *void_reasons.entry(key.to_string()).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    let users = (0..run.sim.stakers)
        .map(|i| {
            let id = staker_id(i);
            (id.to_string(), engine.user_stats(&id))
        })
        .collect();
    let ledger = engine.ledger();
    let audit = engine.audit();
    if !audit.is_clean() {
        tracing::warn!(violations = audit.violations.len(), "Audit found violations");
    }

    SimulationSummary {
        seed: run.sim.seed,
        first_cycle,
        cycles: run.sim.cycles,
        stakers: run.sim.stakers,
        started_at,
        finished_at: run.clock.to_string(),
        stakes_placed: run.summary.stakes_placed,
        stakes_rejected: run.summary.stakes_rejected,
        retractions: run.summary.retractions,
        rounds_settled: settled,
        rounds_voided: voided,
        wins_by_side,
        void_reasons,
        batch_claims: run.summary.batch_claims,
        events_emitted: engine.events().len(),
        global: engine.global_stats(),
        users,
        supply_conserved: ledger.total_supply() == ledger.total_minted()
            && ledger.balance_of(ledger.custody()) >= audit.liabilities,
        audit,
    }
}
