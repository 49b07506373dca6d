//! Metric Source
//!
//! The observation collaborator: for each tracked asset, a cumulative series
//! sampled at offsets into the past. [`TickHistory`] is the in-crate
//! implementation backing the simulator and tests: a bounded ring of tick
//! observations with a time-weighted cumulative,
//!
//! ```text
//! cumulative(t) = cumulative(t_k) + tick_k * (t - t_k)    for t_k <= t
//! ```
//!
//! where `t_k` is the last observation at or before `t`.

use crate::pool::error::ObservationError;
use crate::pool::types::{Side, UnixSecs};
use std::collections::VecDeque;

/// Serves cumulative observation series for the two tracked assets.
pub trait MetricSource: Send {
    /// Cumulative value of `asset` at `now - seconds_ago` for each offset,
    /// in the same order as `seconds_agos`.
    fn observe(
        &self,
        asset: Side,
        now: UnixSecs,
        seconds_agos: &[u64],
    ) -> Result<Vec<i128>, ObservationError>;

    /// Ask the source to retain at least `min_samples` observations per asset.
    fn ensure_history_depth(&mut self, min_samples: usize);
}

// =============================================================================
// TICK HISTORY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickObservation {
    timestamp: UnixSecs,
    /// Tick in effect from `timestamp` until the next observation.
    tick: i64,
    /// Cumulative at `timestamp`.
    cumulative: i128,
}

#[derive(Debug, Clone, Default)]
struct AssetHistory {
    observations: VecDeque<TickObservation>,
}

impl AssetHistory {
    fn record(&mut self, now: UnixSecs, tick: i64, capacity: usize) {
        let last = self.observations.back().copied();
        match last {
            // Same-second update replaces the tick without adding a point.
            Some(prev) if prev.timestamp == now => {
                if let Some(back) = self.observations.back_mut() {
                    back.tick = tick;
                }
            }
            Some(prev) if now < prev.timestamp => {
                tracing::warn!(
                    now,
                    last = prev.timestamp,
                    "Ignoring out-of-order tick observation"
                );
            }
            _ => {
                let cumulative = last
                    .map(|prev| {
                        let dt = i128::from(now - prev.timestamp);
                        prev.cumulative
                            .saturating_add(i128::from(prev.tick).saturating_mul(dt))
                    })
                    .unwrap_or(0);
                self.observations.push_back(TickObservation {
                    timestamp: now,
                    tick,
                    cumulative,
                });
                while self.observations.len() > capacity.max(1) {
                    self.observations.pop_front();
                }
            }
        }
    }

    fn cumulative_at(&self, asset: Side, target: UnixSecs) -> Result<i128, ObservationError> {
        let oldest = self
            .observations
            .front()
            .ok_or(ObservationError::Unavailable { asset })?;
        if target < oldest.timestamp {
            return Err(ObservationError::InsufficientHistory {
                asset,
                oldest: oldest.timestamp,
                requested: target,
            });
        }

        // Last observation at or before `target`; index >= 1 since oldest <= target.
        let idx = self
            .observations
            .partition_point(|obs| obs.timestamp <= target);
        let obs = &self.observations[idx - 1];
        let dt = i128::from(target - obs.timestamp);
        Ok(obs
            .cumulative
            .saturating_add(i128::from(obs.tick).saturating_mul(dt)))
    }
}

/// Ring-buffered tick history for both assets.
#[derive(Debug, Clone)]
pub struct TickHistory {
    capacity: usize,
    asset_a: AssetHistory,
    asset_b: AssetHistory,
}

impl TickHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            asset_a: AssetHistory::default(),
            asset_b: AssetHistory::default(),
        }
    }

    fn asset(&self, asset: Side) -> &AssetHistory {
        match asset {
            Side::A => &self.asset_a,
            Side::B => &self.asset_b,
        }
    }

    /// Record the tick in effect for `asset` from `now` on.
    pub fn record(&mut self, asset: Side, now: UnixSecs, tick: i64) {
        let capacity = self.capacity;
        match asset {
            Side::A => self.asset_a.record(now, tick, capacity),
            Side::B => self.asset_b.record(now, tick, capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self, asset: Side) -> usize {
        self.asset(asset).observations.len()
    }

    pub fn oldest_timestamp(&self, asset: Side) -> Option<UnixSecs> {
        self.asset(asset).observations.front().map(|o| o.timestamp)
    }
}

impl MetricSource for TickHistory {
    fn observe(
        &self,
        asset: Side,
        now: UnixSecs,
        seconds_agos: &[u64],
    ) -> Result<Vec<i128>, ObservationError> {
        let history = self.asset(asset);
        seconds_agos
            .iter()
            .map(|&ago| history.cumulative_at(asset, now.saturating_sub(ago)))
            .collect()
    }

    fn ensure_history_depth(&mut self, min_samples: usize) {
        if min_samples > self.capacity {
            tracing::info!(
                from = self.capacity,
                to = min_samples,
                "Growing tick history capacity"
            );
            self.capacity = min_samples;
        }
    }
}
