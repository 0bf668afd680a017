//! Shared test helpers for integration tests.

use velock_core::constants::WEEK;
use velock_core::positions::MemoryPositionRegistry;
use velock_core::token::{MemoryTokenLedger, TokenLedger};
use velock_core::types::{AccountId, Amount, BlockNumber, Env, Timestamp};
use velock_escrow::staking::RewardConfig;
use velock_escrow::VeEscrow;

/// Week-aligned base time all scenarios start from.
pub const BASE: Timestamp = WEEK * 1000;
/// One day; scenario offsets are expressed in days within a week.
pub const DAY: u64 = WEEK / 7;
/// One whole token (18 decimals).
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Custody account of the engine under test.
pub const ESCROW: AccountId = AccountId([0xEE; 32]);
/// Reward provider and pool admin.
pub const PROVIDER: AccountId = AccountId([0xAD; 32]);

pub type TestEscrow = VeEscrow<MemoryTokenLedger, MemoryPositionRegistry>;

/// Account derived from a seed byte.
pub fn acct(seed: u8) -> AccountId {
    AccountId([seed; 32])
}

/// Engine with funded, pre-approved accounts 1–8 and a funded provider.
///
/// Construction time is `BASE` at block 0.
pub fn make_escrow(reward_per_block: Amount, end_block: BlockNumber) -> TestEscrow {
    let mut token = MemoryTokenLedger::new();
    token.mint(PROVIDER, 100_000_000 * UNIT).unwrap();
    for seed in 1..=8 {
        token.mint(acct(seed), 100_000_000 * UNIT).unwrap();
        token.approve(acct(seed), ESCROW, u128::MAX).unwrap();
    }
    VeEscrow::new(
        token,
        MemoryPositionRegistry::new(),
        ESCROW,
        PROVIDER,
        RewardConfig {
            provider: PROVIDER,
            reward_per_block,
            start_block: 0,
            end_block,
        },
        &Env::new(BASE, 0),
    )
}

/// Engine with the reward pool effectively disabled.
pub fn make_plain_escrow() -> TestEscrow {
    make_escrow(0, u64::MAX)
}

/// Shorthand for an execution context.
pub fn env(timestamp: Timestamp, block: BlockNumber) -> Env {
    Env::new(timestamp, block)
}
