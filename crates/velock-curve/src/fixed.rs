//! Q128 fixed-point arithmetic for the reward accumulator.
//!
//! Rewards settle through a cumulative "per share unit" value scaled by
//! 2^128. Both directions truncate: the pool-wide delta
//! `tokens * 2^128 / total` first, then a staker's payout
//! `weight * delta / 2^128`. The truncation order is observable in payout
//! amounts and must not be reordered.

use primitive_types::U256;

use velock_core::error::StakeError;
use velock_core::types::Amount;

/// The accumulator scale, 2^128.
pub const Q128: U256 = U256([0, 0, 1, 0]);

/// Pool-wide accumulator increment for `tokens` emitted over a denominator
/// of `total` share units: `tokens * 2^128 / total`, truncating.
///
/// # Errors
///
/// [`StakeError::ArithmeticOverflow`] when `total` is zero; callers gate on
/// a non-empty pool, so a zero denominator is an internal invariant breach.
pub fn acc_delta(tokens: Amount, total: Amount) -> Result<U256, StakeError> {
    if total == 0 {
        return Err(StakeError::ArithmeticOverflow);
    }
    // tokens < 2^128, so the shift cannot overflow 256 bits.
    Ok((U256::from(tokens) << 128) / U256::from(total))
}

/// A staker's payout for an accumulator interval: `weight * delta / 2^128`,
/// truncating.
///
/// # Errors
///
/// [`StakeError::ArithmeticOverflow`] if the product exceeds 256 bits or
/// the payout exceeds `u128`. Unreachable while emissions and weights stay
/// within token bounds.
pub fn reward_from(weight: u128, delta: U256) -> Result<Amount, StakeError> {
    let scaled = U256::from(weight)
        .checked_mul(delta)
        .ok_or(StakeError::ArithmeticOverflow)?;
    Amount::try_from(scaled >> 128).map_err(|_| StakeError::ArithmeticOverflow)
}
