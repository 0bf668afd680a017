//! Multi-staker reward accrual over staggered stakes and exits.
//!
//! Three stakers enter the pool at different blocks, two leave, one
//! collects mid-stream, one returns. The test mirrors the Q128 accumulator
//! by hand (`acc_delta` per interval against the amount-snapshot
//! denominator, `reward_from` per payout against the decaying share
//! weight) and checks every payout, denominator value and staking id the
//! engine produces along the way.

use primitive_types::U256;
use velock_core::constants::WEEK;
use velock_core::error::{StakeError, VeError};
use velock_core::positions::PositionRegistry;
use velock_core::token::TokenLedger;
use velock_core::types::Timestamp;
use velock_curve::fixed::{acc_delta, reward_from};
use velock_curve::segment::weight_at;
use velock_tests::helpers::*;

const RATE: u128 = 1_200_000_000_000_000;
const E15: u128 = 1_000_000_000_000_000;

fn w(n: u64) -> Timestamp {
    BASE + WEEK * n
}

#[test]
fn staggered_stakers_settle_against_the_shared_accumulator() {
    let mut ve = make_escrow(RATE, 10_000);
    let tester = acct(1);
    let other = acct(2);
    let third = acct(3);

    // Locks held throughout; only some are ever staked.
    let t0 = env(BASE, 0);
    let l1 = ve.create_lock(tester, 220 * E15, w(35), &t0).unwrap();
    let l2 = ve.create_lock(other, 190 * E15, w(35), &t0).unwrap();
    let l3 = ve.create_lock(tester, 280 * E15, w(30), &t0).unwrap();
    let _l4 = ve.create_lock(other, 310 * E15, w(30), &t0).unwrap();
    let l5 = ve.create_lock(third, 370 * E15, w(42), &t0).unwrap();

    let provider_before = ve.token().balance_of(PROVIDER);
    let mut paid_total = 0u128;

    // --- block 5: tester stakes, pool was empty so the accumulator is
    // still zero ---
    let t1 = env(w(5) + WEEK / 5, 5);
    ve.stake(tester, l1, &t1).unwrap();
    assert_eq!(ve.stake_amount(), 220 * E15);
    let s1 = ve.staking_status(l1).unwrap();
    assert_eq!(s1.staking_id, 1);
    assert_eq!(s1.lock_amount, 220 * E15);
    let ve1 = weight_at(ve.nft_locked(l1).unwrap(), t1.timestamp);
    assert_eq!(s1.last_ve, ve1);
    assert_eq!(s1.last_touch_acc, U256::zero());

    // --- block 20: other joins; 15 blocks settle against tester alone ---
    let t2 = env(w(12) + 7 * WEEK / 10, 20);
    ve.stake(other, l2, &t2).unwrap();
    let acc1 = acc_delta(15 * RATE, 220 * E15).unwrap();
    assert_eq!(ve.reward_info().acc_reward_per_share, acc1);
    assert_eq!(ve.stake_amount(), 410 * E15);
    let s2 = ve.staking_status(l2).unwrap();
    assert_eq!(s2.staking_id, 2);
    let ve2 = weight_at(ve.nft_locked(l2).unwrap(), t2.timestamp);
    assert_eq!((s2.last_ve, s2.last_touch_acc), (ve2, acc1));

    // --- block 30: third joins ---
    let t3 = env(w(13) + WEEK / 2, 30);
    ve.stake(third, l5, &t3).unwrap();
    let acc2 = acc1 + acc_delta(10 * RATE, 410 * E15).unwrap();
    assert_eq!(ve.reward_info().acc_reward_per_share, acc2);
    assert_eq!(ve.stake_amount(), 780 * E15);
    let s3 = ve.staking_status(l5).unwrap();
    assert_eq!(s3.staking_id, 3);
    let ve3 = weight_at(ve.nft_locked(l5).unwrap(), t3.timestamp);
    assert_eq!((s3.last_ve, s3.last_touch_acc), (ve3, acc2));

    // --- block 32: other exits with everything earned since block 20 ---
    let t4 = env(w(15), 32);
    let acc3 = acc2 + acc_delta(2 * RATE, 780 * E15).unwrap();
    let expected = reward_from(ve2, acc3 - acc1).unwrap();
    let before = ve.token().balance_of(other);
    let paid = ve.un_stake(other, &t4).unwrap();
    assert_eq!(paid, expected);
    assert_eq!(ve.token().balance_of(other), before + paid);
    paid_total += paid;
    assert_eq!(ve.stake_amount(), 590 * E15);
    assert_eq!(ve.staked_nft(other), None);
    assert_eq!(ve.staking_status(l2).unwrap().staking_id, 0);
    assert_eq!(ve.positions().owner_of(l2), Some(other));

    // --- block 35: tester collects, share weight resyncs to current ve ---
    let t5 = env(w(15) + WEEK / 10, 35);
    let acc4 = acc3 + acc_delta(3 * RATE, 590 * E15).unwrap();
    let expected = reward_from(ve1, acc4).unwrap();
    let paid = ve.collect(tester, &t5).unwrap();
    assert_eq!(paid, expected);
    paid_total += paid;
    let s1 = ve.staking_status(l1).unwrap();
    let ve1b = weight_at(ve.nft_locked(l1).unwrap(), t5.timestamp);
    assert!(ve1b < ve1);
    assert_eq!((s1.last_ve, s1.last_touch_acc), (ve1b, acc4));

    // --- block 41: tester exits; only the post-collect interval pays,
    // at the resynced (smaller) weight ---
    let t6 = env(w(16) + 3 * WEEK / 5, 41);
    let acc5 = acc4 + acc_delta(6 * RATE, 590 * E15).unwrap();
    let expected = reward_from(ve1b, acc5 - acc4).unwrap();
    let paid = ve.un_stake(tester, &t6).unwrap();
    assert_eq!(paid, expected);
    paid_total += paid;
    assert_eq!(ve.stake_amount(), 370 * E15);

    // --- block 42: third collects across all three denominator regimes ---
    let t7 = env(w(16) + 7 * WEEK / 10, 42);
    let acc6 = acc5 + acc_delta(RATE, 370 * E15).unwrap();
    let expected = reward_from(ve3, acc6 - acc2).unwrap();
    let paid = ve.collect(third, &t7).unwrap();
    assert_eq!(paid, expected);
    paid_total += paid;
    assert_eq!(ve.reward_info().acc_reward_per_share, acc6);

    // --- block 50: tester returns with a different lock and a fresh id ---
    let t8 = env(w(17), 50);
    ve.stake(tester, l3, &t8).unwrap();
    assert_eq!(ve.staking_status(l3).unwrap().staking_id, 4);
    // The earlier position's vacated record is still there.
    assert_eq!(ve.staking_status(l1).unwrap().staking_id, 0);
    assert_eq!(ve.stake_amount(), (370 + 280) * E15);

    // Every token paid came from the provider, and the pool never paid
    // more than it emitted over the 37 settled blocks.
    assert_eq!(ve.token().balance_of(PROVIDER), provider_before - paid_total);
    assert!(paid_total <= 37 * RATE);
}

#[test]
fn staked_lock_changes_do_not_resync_until_collect() {
    let mut ve = make_escrow(RATE, 10_000);
    let tester = acct(1);
    let donor = acct(2);
    let at = env(w(1), 1);
    let id = ve.create_lock(tester, 220 * E15, w(20), &at).unwrap();
    ve.stake(tester, id, &at).unwrap();
    let snapshot = ve.staking_status(id).unwrap();

    // Owner extends while staked; anyone tops up while staked. Neither
    // touches the settlement record.
    let mid = env(w(2), 5);
    ve.increase_unlock_time(tester, id, w(30), &mid).unwrap();
    ve.increase_amount(donor, id, 80 * E15, &mid).unwrap();
    let s = ve.staking_status(id).unwrap();
    assert_eq!(s.last_ve, snapshot.last_ve);
    assert_eq!(s.lock_amount, snapshot.lock_amount);
    assert_eq!(ve.stake_amount(), 220 * E15);

    // The earlier interval still pays at the stale weight; only then does
    // the record pick the grown lock up.
    let later = env(w(3), 11);
    let acc = acc_delta(10 * RATE, 220 * E15).unwrap();
    let expected = reward_from(snapshot.last_ve, acc).unwrap();
    assert_eq!(ve.collect(tester, &later).unwrap(), expected);
    let s = ve.staking_status(id).unwrap();
    assert_eq!(s.last_ve, weight_at(ve.nft_locked(id).unwrap(), later.timestamp));
    assert!(s.last_ve > snapshot.last_ve);
}

#[test]
fn staked_positions_resist_transfers_of_value() {
    let mut ve = make_escrow(RATE, 10_000);
    let tester = acct(1);
    let at = env(w(1), 1);
    let a = ve.create_lock(tester, 220 * E15, w(20), &at).unwrap();
    let b = ve.create_lock(tester, 100 * E15, w(20), &at).unwrap();
    ve.stake(tester, a, &at).unwrap();

    // A staked position can be neither merged nor withdrawn from.
    assert!(matches!(
        ve.merge(tester, a, b, &at),
        Err(VeError::Stake(StakeError::PositionStaked(_)))
    ));
    assert!(matches!(
        ve.merge(tester, b, a, &at),
        Err(VeError::Stake(StakeError::PositionStaked(_)))
    ));
    assert!(matches!(
        ve.withdraw(tester, a, &env(w(20), 2)),
        Err(VeError::Stake(StakeError::PositionStaked(_)))
    ));

    // After unstaking, the expired lock unwinds normally.
    ve.un_stake(tester, &env(w(20), 3)).unwrap();
    assert_eq!(ve.withdraw(tester, a, &env(w(20), 4)).unwrap(), 220 * E15);
}

#[test]
fn vacated_record_cannot_collect() {
    let mut ve = make_escrow(RATE, 10_000);
    let tester = acct(1);
    let at = env(w(1), 1);
    let id = ve.create_lock(tester, 220 * E15, w(20), &at).unwrap();
    ve.stake(tester, id, &at).unwrap();
    ve.un_stake(tester, &env(w(2), 10)).unwrap();
    assert!(matches!(
        ve.collect(tester, &env(w(3), 20)),
        Err(VeError::Stake(StakeError::NotStaked))
    ));
}
