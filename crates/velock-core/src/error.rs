//! Error types for the Velock engine.
use thiserror::Error;

use crate::types::{Amount, NftId, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("invalid amount: {0}")] InvalidAmount(Amount),
    #[error("invalid duration: unlock {unlock} vs now {now}")] InvalidDuration { unlock: Timestamp, now: Timestamp },
    #[error("not owner of position {0}")] NotOwner(NftId),
    #[error("position {0} not expired")] NotExpired(NftId),
    #[error("position {0} already burned or unknown")] AlreadyBurned(NftId),
    #[error("position {0} still holds locked tokens")] StillLocked(NftId),
    #[error("invalid merge target: from {from} into {to}")] InvalidMergeTarget { from: NftId, to: NftId },
    #[error("unknown position: {0}")] UnknownPosition(NftId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("replay budget exceeded: {weeks} week boundaries")] ReplayBudgetExceeded { weeks: u64 },
    #[error("non-monotonic time: {now} before tip {tip}")] NonMonotonicTime { now: Timestamp, tip: Timestamp },
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    #[error("account already has a staked position")] AlreadyStaked,
    #[error("no staked position for account")] NotStaked,
    #[error("position {0} is staked")] PositionStaked(NftId),
    #[error("not the reward owner")] NotRewardOwner,
    #[error("invalid start block: {0}")] InvalidStartBlock(u64),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: Amount, need: Amount },
    #[error("insufficient allowance: have {have}, need {need}")] InsufficientAllowance { have: Amount, need: Amount },
    #[error("balance overflow")] BalanceOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("unknown token: {0}")] UnknownToken(NftId),
    #[error("not token owner: {0}")] NotTokenOwner(NftId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VeError {
    #[error(transparent)] Lock(#[from] LockError),
    #[error(transparent)] Checkpoint(#[from] CheckpointError),
    #[error(transparent)] Stake(#[from] StakeError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Position(#[from] PositionError),
}
