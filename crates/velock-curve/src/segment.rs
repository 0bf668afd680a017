//! Linear decay segments on the weekly grid.
//!
//! A lock of `amount` tokens until `end` contributes a line
//! `w(t) = slope * (end - t)` with `slope = amount / MAXTIME` (integer
//! truncation: the dust below one slope unit never earns weight). Unlock
//! times are floored to week boundaries, so every slope change in the
//! aggregate curve lands on the weekly grid.
//! All arithmetic is integer-only and checked.

use velock_core::constants::{MAXTIME, WEEK};
use velock_core::error::CheckpointError;
use velock_core::types::{Amount, LockedBalance, Timestamp};

/// Floor a timestamp to its week boundary.
pub fn floor_to_week(t: Timestamp) -> Timestamp {
    t / WEEK * WEEK
}

/// Decay rate of a lock: `amount / MAXTIME`, truncating.
///
/// Amounts are validated against `MAX_LOCK_AMOUNT` at lock creation, so the
/// cast is lossless.
pub fn slope_of(amount: Amount) -> i128 {
    (amount / MAXTIME as u128) as i128
}

/// Curve value `slope * remaining` at `remaining` seconds before expiry.
pub fn bias_of(slope: i128, remaining: u64) -> Result<i128, CheckpointError> {
    slope
        .checked_mul(remaining as i128)
        .ok_or(CheckpointError::ArithmeticOverflow)
}

/// One lock's contribution to the aggregate curve at a reference time.
///
/// `bias` and `slope` are both zero for expired or empty locks, so a
/// segment built from an expired lock records no deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LockSegment {
    /// Curve value at the reference time.
    pub bias: i128,
    /// Decay per second.
    pub slope: i128,
    /// Unlock time (week-aligned). Kept for slope-change scheduling.
    pub end: Timestamp,
}

impl LockSegment {
    /// Segment of `lock` as seen at time `now`.
    pub fn at(lock: LockedBalance, now: Timestamp) -> Result<Self, CheckpointError> {
        if lock.amount == 0 || lock.end <= now {
            return Ok(Self { bias: 0, slope: 0, end: lock.end });
        }
        let slope = slope_of(lock.amount);
        let bias = bias_of(slope, lock.end - now)?;
        Ok(Self { bias, slope, end: lock.end })
    }
}

/// Closed-form voting weight of a single lock at time `t`.
///
/// `slope * (end - t)`, zero at or after expiry. Distinct from aggregate
/// reads, which replay the checkpoint history.
pub fn weight_at(lock: LockedBalance, t: Timestamp) -> u128 {
    if lock.amount == 0 || lock.end <= t {
        return 0;
    }
    // slope and remaining are both non-negative and bounded by the
    // MAX_LOCK_AMOUNT invariant.
    (slope_of(lock.amount) as u128) * (lock.end - t) as u128
}
