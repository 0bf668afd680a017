//! Protocol constants. All times are UNIX seconds, all amounts are in the
//! smallest unit of the locked token.

/// Seconds per week. Unlock times are floored to whole-week boundaries so
/// that slope changes cluster on a sparse, predictable grid.
pub const WEEK: u64 = 604_800;

/// Maximum lock duration: 4 years of 365 days, in seconds.
///
/// Also the slope divisor: a lock of `amount` decays at
/// `amount / MAXTIME` weight units per second, so a full-length lock
/// starts at (slightly under) its locked amount and reaches zero at expiry.
pub const MAXTIME: u64 = 4 * 365 * 86_400;

/// Maximum number of week boundaries a single checkpoint replay may cross.
///
/// A replay spanning more boundaries fails with `ReplayBudgetExceeded`
/// before touching any state; callers catch up with repeated permissionless
/// `checkpoint` calls.
pub const MAX_REPLAY_WEEKS: u64 = 255;

/// Largest lockable amount.
///
/// Bias is `slope * remaining` with `remaining <= MAXTIME`, so capping the
/// amount at `i128::MAX / MAXTIME` keeps every per-lock bias, and any
/// realistic sum of them, inside the signed 128-bit curve representation.
pub const MAX_LOCK_AMOUNT: u128 = (i128::MAX / MAXTIME as i128) as u128;
