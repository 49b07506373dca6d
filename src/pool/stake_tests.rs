//! Stake ledger tests: window enforcement, conservation, retraction.

use crate::pool::error::{EngineError, TransferError};
use crate::pool::events::EngineEvent;
use crate::pool::ledger::ValueLedger;
use crate::pool::test_support::{account, funded_engine, times, ScriptedSource, TestEngine};
use crate::pool::types::Side;

fn engine() -> TestEngine {
    funded_engine(
        ScriptedSource::linear(2, 1),
        &[("alice", 1_000), ("bob", 1_000), ("carol", 1_000)],
    )
}

fn side_sums(engine: &TestEngine, cycle_id: u64) -> (u128, u128) {
    let round = engine.round(cycle_id);
    let (mut a, mut b) = (0, 0);
    for name in ["alice", "bob", "carol"] {
        let p = engine.stake_of(cycle_id, &account(name));
        a += p.stake_a;
        b += p.stake_b;
    }
    assert_eq!(a, round.total_stake(Side::A), "side A conservation");
    assert_eq!(b, round.total_stake(Side::B), "side B conservation");
    (a, b)
}

#[test]
fn test_stake_moves_value_into_custody() {
    let mut engine = engine();
    let t = times(1);
    let alice = account("alice");

    let receipt = engine.add_stake(t.start, 1, &alice, Side::A, 300).unwrap();
    assert!(receipt.first_in_round);
    assert_eq!(receipt.side_total, 300);

    let custody = engine.ledger().custody().clone();
    assert_eq!(engine.ledger().balance_of(&alice), 700);
    assert_eq!(engine.ledger().balance_of(&custody), 300);
    assert_eq!(engine.round(1).total_stake(Side::A), 300);
}

#[test]
fn test_conservation_across_mixed_stakes() {
    let mut engine = engine();
    let t = times(1);
    engine.add_stake(t.start, 1, &account("alice"), Side::A, 100).unwrap();
    engine.add_stake(t.start + 1, 1, &account("bob"), Side::B, 250).unwrap();
    engine.add_stake(t.start + 2, 1, &account("alice"), Side::B, 40).unwrap();
    engine.add_stake(t.start + 3, 1, &account("carol"), Side::A, 5).unwrap();
    engine
        .retract_stake(t.start + 4, 1, &account("bob"), Side::B, 50)
        .unwrap();

    assert_eq!(side_sums(&engine, 1), (105, 240));
    assert!(engine.audit().is_clean());
}

#[test]
fn test_zero_amount_rejected() {
    let mut engine = engine();
    let t = times(1);
    assert_eq!(
        engine.add_stake(t.start, 1, &account("alice"), Side::A, 0),
        Err(EngineError::InvalidAmount)
    );
    assert_eq!(
        engine.retract_stake(t.start, 1, &account("alice"), Side::A, 0),
        Err(EngineError::InvalidAmount)
    );
}

#[test]
fn test_window_closes_at_staking_end() {
    let mut engine = engine();
    let t = times(1);
    engine
        .add_stake(t.staking_end - 1, 1, &account("alice"), Side::A, 10)
        .unwrap();

    let err = engine
        .add_stake(t.staking_end, 1, &account("alice"), Side::A, 10)
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::WindowClosed {
            cycle_id: 1,
            staking_end_time: t.staking_end
        }
    );
    assert!(err.is_retryable());

    assert!(matches!(
        engine.retract_stake(t.staking_end, 1, &account("alice"), Side::A, 10),
        Err(EngineError::WindowClosed { .. })
    ));
    assert_eq!(engine.round(1).total_stake(Side::A), 10);
}

#[test]
fn test_future_round_not_open() {
    let mut engine = engine();
    let t = times(5);
    let err = engine
        .add_stake(t.start - 1, 5, &account("alice"), Side::A, 10)
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::RoundNotOpen {
            cycle_id: 5,
            start_time: t.start
        }
    );
    assert_eq!(engine.ledger().balance_of(&account("alice")), 1_000);
}

#[test]
fn test_retract_more_than_staked() {
    let mut engine = engine();
    let t = times(1);
    engine.add_stake(t.start, 1, &account("bob"), Side::B, 60).unwrap();

    let err = engine
        .retract_stake(t.start, 1, &account("bob"), Side::B, 61)
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientStake {
            cycle_id: 1,
            side: Side::B,
            requested: 61,
            available: 60
        }
    );
    // Stake on the other side does not count.
    assert!(matches!(
        engine.retract_stake(t.start, 1, &account("bob"), Side::A, 1),
        Err(EngineError::InsufficientStake { available: 0, .. })
    ));
}

#[test]
fn test_retract_returns_value() {
    let mut engine = engine();
    let t = times(1);
    let bob = account("bob");
    engine.add_stake(t.start, 1, &bob, Side::B, 60).unwrap();
    let receipt = engine.retract_stake(t.start + 10, 1, &bob, Side::B, 60).unwrap();

    assert_eq!(receipt.side_total, 0);
    assert_eq!(engine.ledger().balance_of(&bob), 1_000);
    assert_eq!(engine.stake_of(1, &bob).total(), 0);

    let stats = engine.user_stats(&bob);
    assert_eq!(stats.wagered, 60);
    assert_eq!(stats.retracted, 60);
    assert_eq!(stats.rounds_played, 1);
    assert_eq!(engine.global_stats().total_retracted, 60);
}

#[test]
fn test_rounds_played_counts_first_stake_only() {
    let mut engine = engine();
    let alice = account("alice");
    let t1 = times(1);
    let t2 = times(2);
    engine.add_stake(t1.start, 1, &alice, Side::A, 10).unwrap();
    engine.add_stake(t1.start, 1, &alice, Side::B, 10).unwrap();
    engine.add_stake(t1.start, 1, &alice, Side::A, 10).unwrap();
    engine.add_stake(t2.start, 2, &alice, Side::B, 10).unwrap();

    let stats = engine.user_stats(&alice);
    assert_eq!(stats.rounds_played, 2);
    assert_eq!(stats.wagered, 40);
    assert_eq!(engine.global_stats().total_volume, 40);
}

#[test]
fn test_overdraft_leaves_no_trace() {
    let mut engine = engine();
    let t = times(1);
    let err = engine
        .add_stake(t.start, 1, &account("alice"), Side::A, 1_001)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transfer(TransferError::InsufficientFunds { .. })
    ));
    assert_eq!(engine.round(1).pot(), 0);
    assert!(!engine.stakes.has_entered(1, &account("alice")));
    assert_eq!(engine.user_stats(&account("alice")).wagered, 0);
    // The round was still touched, so it is open.
    assert!(matches!(
        engine.events(),
        [EngineEvent::RoundOpened { cycle_id: 1, .. }]
    ));
}

#[test]
fn test_stake_events_carry_side_total() {
    let mut engine = engine();
    let t = times(1);
    engine.add_stake(t.start, 1, &account("alice"), Side::A, 30).unwrap();
    engine.add_stake(t.start, 1, &account("bob"), Side::A, 20).unwrap();
    let events = engine.drain_events();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[2],
        EngineEvent::StakeAdded { side_total: 50, amount: 20, .. }
    ));
    assert!(engine.events().is_empty());
}
