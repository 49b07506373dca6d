//! Realized-Variance Metric
//!
//! Turns a cumulative observation series into one comparable score per asset:
//!
//! ```text
//! metric = Σ_{i=1..n} ((series[i] - series[i-1]) / step)^2
//! ```
//!
//! Integer arithmetic throughout. The per-step quotient truncates toward zero
//! before squaring, which under-weights large single-step moves slightly.
//! Both assets carry the same bias and only a strict comparison decides the
//! winner. Squares and sums saturate at `u128::MAX` instead of wrapping.

use crate::pool::types::{Side, UnixSecs};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Side that wins when both metrics are equal.
pub const TIE_WINNER: Side = Side::B;

// =============================================================================
// SAMPLING PLAN
// =============================================================================

/// Sampling schedule over the measurement window `[staking_end, window_end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPlan {
    step_secs: u64,
    samples: u64,
}

impl SamplingPlan {
    /// `None` unless `step` divides `window` exactly into at least 2 steps.
    pub fn new(window_secs: u64, step_secs: u64) -> Option<Self> {
        if step_secs == 0 || window_secs % step_secs != 0 {
            return None;
        }
        let samples = window_secs / step_secs;
        (samples >= 2).then_some(Self { step_secs, samples })
    }

    pub fn step_secs(&self) -> u64 {
        self.step_secs
    }

    /// Number of steps `n`.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Number of cumulative points `n + 1`.
    pub fn points(&self) -> usize {
        self.samples as usize + 1
    }

    /// Offsets into the past, relative to `now`, for each sampling point from
    /// `staking_end` up to `staking_end + n * step`, oldest first.
    ///
    /// Points after `now` clamp to an offset of zero.
    pub fn seconds_agos(&self, staking_end: UnixSecs, now: UnixSecs) -> Vec<u64> {
        (0..=self.samples)
            .map(|i| {
                let at = staking_end.saturating_add(i * self.step_secs);
                now.saturating_sub(at)
            })
            .collect()
    }
}

// =============================================================================
// METRIC COMPUTATION
// =============================================================================

/// Realized-variance proxy over a cumulative series of `n + 1` points.
///
/// Series shorter than two points yield zero.
pub fn realized_variance(series: &[i128], step_secs: u64) -> u128 {
    let step = i128::from(step_secs.max(1));
    series
        .windows(2)
        .map(|pair| {
            let delta = pair[1].saturating_sub(pair[0]);
            let rate = (delta / step).unsigned_abs();
            rate.saturating_mul(rate)
        })
        .fold(0u128, |acc, sq| acc.saturating_add(sq))
}

/// Strictly greater metric wins; equality goes to [`TIE_WINNER`].
pub fn decide_winner(metric_a: u128, metric_b: u128) -> Side {
    match metric_a.cmp(&metric_b) {
        Ordering::Greater => Side::A,
        Ordering::Less => Side::B,
        Ordering::Equal => TIE_WINNER,
    }
}

/// Both metrics plus the side they select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricOutcome {
    pub metric_a: u128,
    pub metric_b: u128,
    pub winner: Side,
    pub is_tie: bool,
}

impl MetricOutcome {
    pub fn from_series(series_a: &[i128], series_b: &[i128], plan: &SamplingPlan) -> Self {
        let metric_a = realized_variance(series_a, plan.step_secs());
        let metric_b = realized_variance(series_b, plan.step_secs());
        Self {
            metric_a,
            metric_b,
            winner: decide_winner(metric_a, metric_b),
            is_tie: metric_a == metric_b,
        }
    }

    pub fn metric(&self, side: Side) -> u128 {
        match side {
            Side::A => self.metric_a,
            Side::B => self.metric_b,
        }
    }
}
