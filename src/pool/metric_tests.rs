//! Realized-variance metric and sampling plan tests.

use crate::pool::metric::{
    decide_winner, realized_variance, MetricOutcome, SamplingPlan, TIE_WINNER,
};
use crate::pool::types::Side;

// =============================================================================
// SAMPLING PLAN
// =============================================================================

#[test]
fn test_plan_requires_exact_division() {
    assert!(SamplingPlan::new(900, 60).is_some());
    assert!(SamplingPlan::new(900, 7).is_none());
    assert!(SamplingPlan::new(900, 0).is_none());
    // One step is not enough to measure variance.
    assert!(SamplingPlan::new(900, 900).is_none());
    assert_eq!(SamplingPlan::new(900, 450).map(|p| p.samples()), Some(2));
}

#[test]
fn test_seconds_agos_cover_measurement_window() {
    let plan = SamplingPlan::new(900, 300).unwrap();
    // staking_end = 1500, window_end = 2400, settling at 2430
    let agos = plan.seconds_agos(1_500, 2_430);
    assert_eq!(agos, vec![930, 630, 330, 30]);
    assert_eq!(agos.len(), plan.points());
}

#[test]
fn test_seconds_agos_clamp_future_points() {
    let plan = SamplingPlan::new(900, 300).unwrap();
    assert_eq!(plan.seconds_agos(1_500, 2_000), vec![500, 200, 0, 0]);
}

// =============================================================================
// VARIANCE
// =============================================================================

#[test]
fn test_constant_rate_series() {
    // 3 steps of 60s each moving by 120 => rate 2 => 3 * 4
    let series = [0, 120, 240, 360];
    assert_eq!(realized_variance(&series, 60), 12);
}

#[test]
fn test_sign_does_not_matter() {
    let up = [0, 600, 1_200];
    let down = [0, -600, -1_200];
    assert_eq!(realized_variance(&up, 60), realized_variance(&down, 60));
    assert_eq!(realized_variance(&up, 60), 200);
}

#[test]
fn test_per_step_division_truncates_before_squaring() {
    // 119 / 60 = 1, -119 / 60 = -1
    let series = [0, 119, 0];
    assert_eq!(realized_variance(&series, 60), 2);
    // Moves under one step never register.
    assert_eq!(realized_variance(&[0, 59, 0, 59], 60), 0);
}

#[test]
fn test_short_series_is_zero() {
    assert_eq!(realized_variance(&[], 60), 0);
    assert_eq!(realized_variance(&[42], 60), 0);
}

#[test]
fn test_extreme_deltas_saturate() {
    let series = [i128::MIN, i128::MAX, i128::MIN];
    assert_eq!(realized_variance(&series, 1), u128::MAX);
}

// =============================================================================
// WINNER
// =============================================================================

#[test]
fn test_strictly_greater_wins() {
    assert_eq!(decide_winner(10, 9), Side::A);
    assert_eq!(decide_winner(9, 10), Side::B);
}

#[test]
fn test_tie_goes_to_side_b() {
    assert_eq!(TIE_WINNER, Side::B);
    assert_eq!(decide_winner(7, 7), Side::B);
    assert_eq!(decide_winner(0, 0), Side::B);
}

#[test]
fn test_outcome_from_series() {
    let plan = SamplingPlan::new(180, 60).unwrap();
    let a = [0, 60, 120, 180];
    let b = [0, 120, 240, 360];
    let outcome = MetricOutcome::from_series(&a, &b, &plan);
    assert_eq!(outcome.metric_a, 3);
    assert_eq!(outcome.metric_b, 12);
    assert_eq!(outcome.winner, Side::B);
    assert!(!outcome.is_tie);
    assert_eq!(outcome.metric(Side::A), 3);

    let tie = MetricOutcome::from_series(&a, &a, &plan);
    assert!(tie.is_tie);
    assert_eq!(tie.winner, TIE_WINNER);
}
