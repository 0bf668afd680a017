//! Core escrow types: accounts, locks, curve points, staking records.
//!
//! Amounts are `u128` in the smallest token unit. Curve bias/slope are
//! `i128`: slope-change deltas are signed, and replay clamps at zero.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Token amount in the smallest unit.
pub type Amount = u128;
/// UNIX timestamp in seconds.
pub type Timestamp = u64;
/// Host chain block number.
pub type BlockNumber = u64;
/// Identifier of a lock position (NFT id). Ids start at 1; 0 means "none".
pub type NftId = u64;

/// A 32-byte account identifier.
///
/// Serialized as a 64-character lowercase hex string so it can serve as a
/// JSON map key in snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero account. Reserved for the escrow's own custody ledger entry.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Host execution context passed into every state-changing operation.
///
/// The engine trusts the host for time: `timestamp` drives the decay curve,
/// `block` drives reward accrual. Timestamps must be non-decreasing across
/// calls or the checkpoint ledger rejects the operation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Env {
    /// Current UNIX time in seconds.
    pub timestamp: Timestamp,
    /// Current block number.
    pub block: BlockNumber,
}

impl Env {
    pub fn new(timestamp: Timestamp, block: BlockNumber) -> Self {
        Self { timestamp, block }
    }
}

/// A lock position: tokens held until a week-aligned unlock time.
///
/// `amount == 0` with the record still present means "withdrawn but not yet
/// burned" (or fully merged away); the NFT still exists until `burn`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LockedBalance {
    /// Locked token amount.
    pub amount: Amount,
    /// Unlock timestamp, floored to a week boundary. 0 after withdrawal.
    pub end: Timestamp,
}

impl LockedBalance {
    pub fn new(amount: Amount, end: Timestamp) -> Self {
        Self { amount, end }
    }
}

/// A point on the aggregate (or per-lock) voting-weight curve.
///
/// Weight at time `t >= timestamp` is `bias - slope * (t - timestamp)`,
/// clamped at zero. Epoch 0 is the zero sentinel.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Point {
    /// Curve value at `timestamp`.
    pub bias: i128,
    /// Decay per second from `timestamp` onward.
    pub slope: i128,
    /// Time this point was recorded, floored or exact per context.
    pub timestamp: Timestamp,
}

impl Point {
    pub const ZERO: Self = Self { bias: 0, slope: 0, timestamp: 0 };
}

/// Global reward-pool configuration and accumulator state.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardInfo {
    /// Account the reward token is paid from.
    pub provider: AccountId,
    /// Cumulative reward per staked token unit, scaled by 2^128.
    pub acc_reward_per_share: U256,
    /// Reward token emitted per block while the pool is active.
    pub reward_per_block: Amount,
    /// First block eligible for accrual.
    pub start_block: BlockNumber,
    /// Last block eligible for accrual (exclusive upper clamp).
    pub end_block: BlockNumber,
    /// Block up to which the accumulator has been settled.
    pub last_touch_block: BlockNumber,
}

/// Per-staker settlement record.
///
/// `staking_id == 0` means the slot is vacant; the rest of the record is
/// the stale remainder of the previous stake and is ignored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StakingStatus {
    /// Monotonic id of the current stake, 0 when unstaked.
    pub staking_id: u64,
    /// Locked amount snapshot taken at stake time. This is the staker's
    /// contribution to the accumulator denominator and stays constant for
    /// the life of the stake.
    pub lock_amount: Amount,
    /// Voting-weight snapshot from the last settlement. Share weight for
    /// rewards accrued since then.
    pub last_ve: u128,
    /// Accumulator value at the last settlement.
    pub last_touch_acc: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_hex_round_trip() {
        let id = AccountId([0xAB; 32]);
        let text = id.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<AccountId>().unwrap(), id);
    }

    #[test]
    fn account_id_rejects_bad_hex() {
        assert!("zz".repeat(32).parse::<AccountId>().is_err());
        assert!("abcd".parse::<AccountId>().is_err());
    }

    #[test]
    fn account_id_as_json_map_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(AccountId([7; 32]), 42u64);
        let json = serde_json::to_string(&map).unwrap();
        let back: BTreeMap<AccountId, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn point_zero_sentinel() {
        assert_eq!(Point::ZERO, Point { bias: 0, slope: 0, timestamp: 0 });
    }

    #[test]
    fn reward_info_serde_round_trip() {
        let info = RewardInfo {
            provider: AccountId([1; 32]),
            acc_reward_per_share: U256::from(123u64) << 128,
            reward_per_block: 1_200_000_000_000_000,
            start_block: 10,
            end_block: 10_000,
            last_touch_block: 10,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: RewardInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
