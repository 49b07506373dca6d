//! Fixtures shared by the pool test modules.

use crate::pool::config::EngineConfig;
use crate::pool::engine::PoolEngine;
use crate::pool::error::ObservationError;
use crate::pool::history::MetricSource;
use crate::pool::ledger::InMemoryLedger;
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};

pub const TREASURY: &str = "treasury";
pub const KEEPER: &str = "keeper";

/// Metric source that answers every query with a fixed series per asset.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    pub series_a: Result<Vec<i128>, ObservationError>,
    pub series_b: Result<Vec<i128>, ObservationError>,
    pub requested_depth: usize,
}

impl ScriptedSource {
    /// Linear cumulative series: every step moves `rate_* * step` so the
    /// metric is `samples * rate^2`.
    pub fn linear(rate_a: i128, rate_b: i128) -> Self {
        let plan = test_config()
            .sampling_plan()
            .expect("test config has a plan");
        let step = i128::from(plan.step_secs());
        let build = |rate: i128| -> Vec<i128> {
            (0..plan.points() as i128).map(|i| i * rate * step).collect()
        };
        Self {
            series_a: Ok(build(rate_a)),
            series_b: Ok(build(rate_b)),
            requested_depth: 0,
        }
    }

    pub fn failing(asset: Side) -> Self {
        let mut source = Self::linear(1, 1);
        let err = Err(ObservationError::Unavailable { asset });
        match asset {
            Side::A => source.series_a = err,
            Side::B => source.series_b = err,
        }
        source
    }
}

impl MetricSource for ScriptedSource {
    fn observe(
        &self,
        asset: Side,
        _now: UnixSecs,
        _seconds_agos: &[u64],
    ) -> Result<Vec<i128>, ObservationError> {
        match asset {
            Side::A => self.series_a.clone(),
            Side::B => self.series_b.clone(),
        }
    }

    fn ensure_history_depth(&mut self, min_samples: usize) {
        self.requested_depth = self.requested_depth.max(min_samples);
    }
}

/// Default windows (300s staking, 900s measuring, 60s step) with a fee
/// recipient so both incentives are charged.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        fee_recipient: Some(TREASURY.to_string()),
        ..EngineConfig::default()
    }
}

pub type TestEngine = PoolEngine<InMemoryLedger, ScriptedSource>;

pub fn account(name: &str) -> AccountId {
    AccountId::new(name)
}

/// Engine whose ledger has minted `balances`.
pub fn funded_engine(source: ScriptedSource, balances: &[(&str, Amount)]) -> TestEngine {
    let config = test_config();
    let mut ledger = InMemoryLedger::new(config.custody());
    for (name, amount) in balances {
        ledger.mint(&account(name), *amount);
    }
    PoolEngine::new(config, ledger, source).expect("test config is valid")
}

/// Key times of a cycle under [`test_config`].
#[derive(Debug, Clone, Copy)]
pub struct CycleTimes {
    pub start: UnixSecs,
    pub staking_end: UnixSecs,
    pub window_end: UnixSecs,
    pub settleable: UnixSecs,
    pub deadline: UnixSecs,
}

pub fn times(cycle_id: CycleId) -> CycleTimes {
    let config = test_config();
    let start = cycle_id * config.cycle_duration_secs();
    let window_end = start + config.cycle_duration_secs();
    let settleable = window_end + config.finality_delay_secs;
    CycleTimes {
        start,
        staking_end: start + config.staking_window_secs,
        window_end,
        settleable,
        deadline: settleable + config.resolve_deadline_secs,
    }
}
