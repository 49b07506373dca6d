//! Claim processor tests: payout arithmetic, at-most-once, batch semantics.

use crate::pool::claim::{mul_div_floor, ClaimKind};
use crate::pool::error::{EngineError, TransferError};
use crate::pool::events::EngineEvent;
use crate::pool::ledger::ValueLedger;
use crate::pool::shared::SharedEngine;
use crate::pool::test_support::{account, funded_engine, times, ScriptedSource, TestEngine, KEEPER};
use crate::pool::types::{Amount, Side};
use std::thread;

/// A wins cycle 1: alice 100 and dave 900 on A, bob 500 on B.
fn settled_scenario_a() -> TestEngine {
    let mut engine = funded_engine(
        ScriptedSource::linear(5, 2),
        &[("alice", 100), ("dave", 900), ("bob", 500)],
    );
    let t = times(1);
    engine.add_stake(t.start, 1, &account("alice"), Side::A, 100).unwrap();
    engine.add_stake(t.start, 1, &account("dave"), Side::A, 900).unwrap();
    engine.add_stake(t.start, 1, &account("bob"), Side::B, 500).unwrap();
    engine.settle(t.settleable, 1, &account(KEEPER)).unwrap();
    engine
}

// =============================================================================
// SINGLE CLAIMS
// =============================================================================

#[test]
fn test_scenario_a_payout() {
    let mut engine = settled_scenario_a();
    let alice = account("alice");

    let quote = engine.claim(1, &alice).unwrap();
    assert_eq!(quote.kind, ClaimKind::Winnings);
    // floor(1496 * 100 / 1000)
    assert_eq!(quote.amount, 149);
    assert_eq!(engine.ledger().balance_of(&alice), 149);
    assert_eq!(engine.stake_of(1, &alice).stake_a, 0);

    let stats = engine.user_stats(&alice);
    assert_eq!(stats.won, 149);
    assert_eq!(stats.rounds_won, 1);
    assert_eq!(stats.win_rate_bps(), 10_000);
}

#[test]
fn test_claim_twice_fails() {
    let mut engine = settled_scenario_a();
    let dave = account("dave");
    assert_eq!(engine.claim(1, &dave).unwrap().amount, 1_346);
    assert_eq!(
        engine.claim(1, &dave),
        Err(EngineError::AlreadyClaimed { cycle_id: 1 })
    );
    assert_eq!(engine.ledger().balance_of(&dave), 1_346);
}

#[test]
fn test_loser_and_stranger_rejected() {
    let mut engine = settled_scenario_a();
    assert_eq!(
        engine.claim(1, &account("bob")),
        Err(EngineError::NotAWinner { cycle_id: 1 })
    );
    assert_eq!(
        engine.claim(1, &account("mallory")),
        Err(EngineError::NotAWinner { cycle_id: 1 })
    );
    // A failed claim sets no flag.
    assert!(!engine.claims.is_claimed(1, &account("bob")));
    assert_eq!(engine.user_stats(&account("bob")).rounds_played, 1);
    assert_eq!(engine.user_stats(&account("bob")).win_rate_bps(), 0);
}

#[test]
fn test_claim_before_settlement_too_early() {
    let mut engine = funded_engine(ScriptedSource::linear(1, 2), &[("alice", 10)]);
    let t = times(1);
    engine.add_stake(t.start, 1, &account("alice"), Side::A, 10).unwrap();
    assert_eq!(
        engine.claim(1, &account("alice")),
        Err(EngineError::TooEarly {
            cycle_id: 1,
            ready_at: None
        })
    );
    assert_eq!(
        engine.claim(99, &account("alice")),
        Err(EngineError::TooEarly {
            cycle_id: 99,
            ready_at: None
        })
    );
}

#[test]
fn test_payout_bound_and_dust() {
    let mut engine = settled_scenario_a();
    let total: Amount = ["alice", "dave"]
        .iter()
        .map(|name| engine.claim(1, &account(name)).unwrap().amount)
        .sum();

    let distributable = engine.round(1).distributable();
    assert_eq!(total, 149 + 1_346);
    assert!(total <= distributable);
    assert!(distributable - total < 2);

    let report = engine.audit();
    assert!(report.is_clean(), "{:?}", report.violations);
    assert_eq!(report.total_residual(), 1);
    assert_eq!(report.liabilities, 0);
    assert_eq!(report.custody_balance, 1);
}

#[test]
fn test_void_refunds_both_sides() {
    let mut engine = funded_engine(ScriptedSource::linear(1, 2), &[("alice", 100)]);
    let t = times(1);
    let alice = account("alice");
    engine.add_stake(t.start, 1, &alice, Side::A, 30).unwrap();
    engine.add_stake(t.start, 1, &alice, Side::B, 20).unwrap();
    engine.settle(t.deadline + 1, 1, &account(KEEPER)).unwrap();

    let quote = engine.claim(1, &alice).unwrap();
    assert_eq!(quote.kind, ClaimKind::Refund);
    assert_eq!(quote.amount, 50);
    assert_eq!(engine.ledger().balance_of(&alice), 100);
    assert_eq!(engine.stake_of(1, &alice).total(), 0);

    let stats = engine.user_stats(&alice);
    assert_eq!(stats.won, 0);
    assert_eq!(stats.refunded, 50);
    assert_eq!(engine.global_stats().total_paid_out, 50);
    assert!(matches!(
        engine.events().last(),
        Some(EngineEvent::Claimed {
            refund: true,
            amount: 50,
            ..
        })
    ));
}

#[test]
fn test_void_without_stake() {
    let mut engine = funded_engine(ScriptedSource::linear(1, 2), &[]);
    engine.settle(times(1).deadline + 1, 1, &account(KEEPER)).unwrap();
    assert_eq!(
        engine.claim(1, &account("alice")),
        Err(EngineError::NoStake { cycle_id: 1 })
    );
}

#[test]
fn test_refused_payout_rolls_back() {
    let mut engine = settled_scenario_a();
    let alice = account("alice");
    let custody = engine.ledger().custody().clone();

    // Drain custody so the payout cannot land.
    let drained = engine.ledger().balance_of(&custody);
    engine.ledger_mut().transfer_out(&account("sink"), drained).unwrap();

    let err = engine.claim(1, &alice).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transfer(TransferError::InsufficientFunds { .. })
    ));
    assert!(!engine.claims.is_claimed(1, &alice));
    assert_eq!(engine.stake_of(1, &alice).stake_a, 100);
    assert_eq!(engine.claims.paid_out(1), 0);

    engine.ledger_mut().mint(&custody, drained);
    assert_eq!(engine.claim(1, &alice).unwrap().amount, 149);
}

#[test]
fn test_racing_claims_pay_once() {
    let shared = SharedEngine::new(settled_scenario_a());
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = shared.clone();
            thread::spawn(move || engine.claim(1, &account("alice")))
        })
        .collect();
    let ok = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(ok, 1);
    shared.with(|engine| {
        assert_eq!(engine.ledger().balance_of(&account("alice")), 149);
    });
}

// =============================================================================
// BATCH
// =============================================================================

#[test]
fn test_scenario_d_batch_skips_silently() {
    let mut engine = funded_engine(ScriptedSource::linear(3, 1), &[("alice", 1_000)]);
    let alice = account("alice");

    // r1: normal win, claimed individually first
    let t1 = times(1);
    engine.add_stake(t1.start, 1, &alice, Side::A, 100).unwrap();
    engine.settle(t1.settleable, 1, &account(KEEPER)).unwrap();
    engine.claim(1, &alice).unwrap();

    // r2: voided (past deadline) with 50 staked
    let t2 = times(2);
    engine.add_stake(t2.start, 2, &alice, Side::B, 50).unwrap();
    engine.settle(t2.deadline + 1, 2, &account(KEEPER)).unwrap();

    // r3: staked but never settled
    let t3 = times(3);
    engine.add_stake(t3.start, 3, &alice, Side::A, 10).unwrap();

    let before = engine.ledger().balance_of(&alice);
    let receipt = engine.claim_batch(&[1, 2, 3], &alice).unwrap();
    assert_eq!(receipt.total, 50);
    assert_eq!(receipt.claims.len(), 1);
    assert_eq!(receipt.claims[0].cycle_id, 2);
    assert_eq!(engine.ledger().balance_of(&alice), before + 50);

    // Skipped rounds keep their state.
    assert!(!engine.claims.is_claimed(3, &alice));
    assert_eq!(engine.stake_of(3, &alice).stake_a, 10);
    assert!(matches!(
        engine.events().last(),
        Some(EngineEvent::BatchClaimed { total: 50, .. })
    ));
}

#[test]
fn test_batch_nothing_to_claim() {
    let mut engine = settled_scenario_a();
    assert_eq!(
        engine.claim_batch(&[1, 2, 3], &account("bob")),
        Err(EngineError::NothingToClaim)
    );
    assert_eq!(
        engine.claim_batch(&[], &account("alice")),
        Err(EngineError::NothingToClaim)
    );
}

#[test]
fn test_batch_ignores_duplicates_and_uses_one_transfer() {
    let mut engine = settled_scenario_a();
    let transfers_before = engine.ledger().transfer_count();

    let receipt = engine.claim_batch(&[1, 1, 1], &account("dave")).unwrap();
    assert_eq!(receipt.total, 1_346);
    assert_eq!(receipt.claims.len(), 1);
    assert_eq!(engine.ledger().transfer_count(), transfers_before + 1);
    assert_eq!(
        engine.claim(1, &account("dave")),
        Err(EngineError::AlreadyClaimed { cycle_id: 1 })
    );
}

#[test]
fn test_batch_failure_rolls_back_every_round() {
    let mut engine = funded_engine(ScriptedSource::linear(1, 2), &[("alice", 100)]);
    let alice = account("alice");
    for cycle in [1, 2] {
        let t = times(cycle);
        engine.add_stake(t.start, cycle, &alice, Side::A, 40).unwrap();
        engine.settle(t.deadline + 1, cycle, &account(KEEPER)).unwrap();
    }

    let custody = engine.ledger().custody().clone();
    engine.ledger_mut().transfer_out(&account("sink"), 50).unwrap();
    assert!(matches!(
        engine.claim_batch(&[1, 2], &alice),
        Err(EngineError::Transfer(_))
    ));
    for cycle in [1, 2] {
        assert!(!engine.claims.is_claimed(cycle, &alice));
        assert_eq!(engine.stake_of(cycle, &alice).stake_a, 40);
    }
    assert_eq!(engine.ledger().balance_of(&custody), 30);
}

#[test]
fn test_zero_payout_winner_same_rule_single_and_batch() {
    let mut engine = funded_engine(
        ScriptedSource::linear(5, 2),
        &[("tiny", 1), ("tiny2", 1), ("whale", 9_998)],
    );
    let t = times(1);
    for (name, amount) in [("tiny", 1), ("tiny2", 1), ("whale", 9_998)] {
        engine.add_stake(t.start, 1, &account(name), Side::A, amount).unwrap();
    }
    engine.settle(t.settleable, 1, &account(KEEPER)).unwrap();
    assert_eq!(engine.round(1).distributable(), 9_970);

    let (tiny, tiny2) = (account("tiny"), account("tiny2"));
    assert_eq!(engine.claim(1, &tiny), Err(EngineError::NothingToClaim));
    assert_eq!(
        engine.claim_batch(&[1], &tiny2),
        Err(EngineError::NothingToClaim)
    );
    for who in [&tiny, &tiny2] {
        assert!(!engine.claims.is_claimed(1, who));
        assert_eq!(engine.stake_of(1, who).stake_a, 1);
        assert_eq!(engine.user_stats(who).rounds_won, 0);
        assert_eq!(
            engine.preview_claim(1, who),
            Err(EngineError::NothingToClaim)
        );
        assert!(engine.claimable_rounds(who, times(2).start, None).is_empty());
    }
    assert!(!engine
        .events()
        .iter()
        .any(|e| matches!(e, EngineEvent::Claimed { amount: 0, .. })));

    // floor(9970 * 9998 / 10000)
    assert_eq!(engine.claim(1, &account("whale")).unwrap().amount, 9_968);
    let report = engine.audit();
    assert!(report.is_clean(), "{:?}", report.violations);
    assert_eq!(report.liabilities, 0);
    assert_eq!(report.total_residual(), 2);
}

// =============================================================================
// READ SURFACE
// =============================================================================

#[test]
fn test_claimable_rounds_and_preview() {
    let mut engine = funded_engine(ScriptedSource::linear(3, 1), &[("alice", 1_000)]);
    let alice = account("alice");
    for cycle in [1, 2] {
        let t = times(cycle);
        engine.add_stake(t.start, cycle, &alice, Side::A, 100).unwrap();
        engine.settle(t.settleable, cycle, &account(KEEPER)).unwrap();
    }
    let now = times(3).start;

    let claimable = engine.claimable_rounds(&alice, now, None);
    assert_eq!(
        claimable.iter().map(|c| c.cycle_id).collect::<Vec<_>>(),
        vec![2, 1]
    );
    assert_eq!(engine.preview_claim(1, &alice).unwrap().amount, 100);
    // Lookback of zero only sees the current cycle.
    assert!(engine.claimable_rounds(&alice, now, Some(0)).is_empty());

    engine.claim(1, &alice).unwrap();
    assert_eq!(
        engine.preview_claim(1, &alice),
        Err(EngineError::AlreadyClaimed { cycle_id: 1 })
    );
    assert_eq!(engine.claimable_rounds(&alice, now, None).len(), 1);
}

#[test]
fn test_mul_div_floor() {
    assert_eq!(mul_div_floor(1_496, 100, 1_000), 149);
    assert_eq!(mul_div_floor(7, 3, 0), 0);
    // Overflowing product falls back to split division.
    let big = u128::MAX / 2;
    assert_eq!(mul_div_floor(big, 4, 4), big);
}
