//! Staking reward pool: one staked position per account, settled lazily
//! through a Q128 accumulator.
//!
//! The accumulator denominator is the running sum of staked locked amounts
//! (a snapshot taken at stake time, constant per stake), while each
//! staker's share of an interval is weighted by its own decaying voting
//! weight from the last settlement. Rewards accrue per block between
//! `start_block` and `end_block` and are paid from the provider account.

use std::collections::HashMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use velock_core::error::{LockError, StakeError, VeError};
use velock_core::types::{
    AccountId, Amount, BlockNumber, Env, NftId, RewardInfo, StakingStatus,
};
use velock_core::positions::PositionRegistry;
use velock_core::token::TokenLedger;
use velock_curve::fixed::{acc_delta, reward_from};
use velock_curve::segment::weight_at;

use crate::escrow::VeEscrow;

/// Reward-pool parameters fixed at engine construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardConfig {
    /// Account rewards are paid from.
    pub provider: AccountId,
    /// Emission per block while the pool is active.
    pub reward_per_block: Amount,
    /// First block eligible for accrual.
    pub start_block: BlockNumber,
    /// Last block eligible for accrual.
    pub end_block: BlockNumber,
}

/// Staking state: pool accumulator plus per-account records.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StakingLedger {
    /// Account allowed to reconfigure the pool.
    admin: AccountId,
    reward: RewardInfo,
    /// Accumulator denominator: sum of staked `lock_amount` snapshots.
    stake_amount: Amount,
    /// Settlement record per position that has ever been staked. Records
    /// persist after unstake with `staking_id == 0`.
    statuses: HashMap<NftId, StakingStatus>,
    /// Account → currently staked position.
    staked: HashMap<AccountId, NftId>,
    /// Staked position → its original owner.
    staked_owner: HashMap<NftId, AccountId>,
    next_staking_id: u64,
}

impl StakingLedger {
    pub(crate) fn new(admin: AccountId, config: RewardConfig, env: &Env) -> Self {
        Self {
            admin,
            reward: RewardInfo {
                provider: config.provider,
                acc_reward_per_share: Default::default(),
                reward_per_block: config.reward_per_block,
                start_block: config.start_block,
                end_block: config.end_block,
                last_touch_block: env.block.max(config.start_block),
            },
            stake_amount: 0,
            statuses: HashMap::new(),
            staked: HashMap::new(),
            staked_owner: HashMap::new(),
            next_staking_id: 0,
        }
    }

    /// Accumulator state advanced to `block` (clamped at `end_block`),
    /// computed without committing. Callers commit the returned pair only
    /// after their external transfers succeed.
    fn settled(&self, block: BlockNumber) -> Result<(U256, BlockNumber), StakeError> {
        let curr = block.min(self.reward.end_block);
        if curr <= self.reward.last_touch_block {
            return Ok((self.reward.acc_reward_per_share, self.reward.last_touch_block));
        }
        let mut acc = self.reward.acc_reward_per_share;
        if self.stake_amount > 0 {
            let blocks = (curr - self.reward.last_touch_block) as u128;
            let tokens = blocks
                .checked_mul(self.reward.reward_per_block)
                .ok_or(StakeError::ArithmeticOverflow)?;
            let delta = acc_delta(tokens, self.stake_amount)?;
            acc = acc.checked_add(delta).ok_or(StakeError::ArithmeticOverflow)?;
        }
        Ok((acc, curr))
    }

    /// Settle the pool accumulator up to `block`, clamped at `end_block`.
    ///
    /// Idempotent: `last_touch_block` never moves backward, and with no
    /// stakers the interval passes without emission.
    pub(crate) fn touch(&mut self, block: BlockNumber) -> Result<(), StakeError> {
        let (acc, last) = self.settled(block)?;
        self.reward.acc_reward_per_share = acc;
        self.reward.last_touch_block = last;
        Ok(())
    }

    /// Reward owed to a settlement record against accumulator value `acc`.
    fn pending(&self, status: &StakingStatus, acc: U256) -> Result<Amount, StakeError> {
        let delta = acc
            .checked_sub(status.last_touch_acc)
            .ok_or(StakeError::ArithmeticOverflow)?;
        reward_from(status.last_ve, delta)
    }

    pub(crate) fn staked_nft_owner(&self, id: NftId) -> Option<AccountId> {
        self.staked_owner.get(&id).copied()
    }
}

impl<T: TokenLedger, N: PositionRegistry> VeEscrow<T, N> {
    /// Stake `caller`'s position `id` into the reward pool.
    ///
    /// One staked position per account; the lock must be active and
    /// unexpired. Custody of the NFT moves to the escrow account. The
    /// locked amount joins the accumulator denominator; the position's
    /// current voting weight becomes its share weight.
    pub fn stake(&mut self, caller: AccountId, id: NftId, env: &Env) -> Result<(), VeError> {
        let now = env.timestamp;
        if self.staking.staked.contains_key(&caller) {
            return Err(StakeError::AlreadyStaked.into());
        }
        let balance = self.active_lock(id)?;
        if balance.end <= now {
            return Err(LockError::InvalidDuration { unlock: balance.end, now }.into());
        }
        if self.positions.owner_of(id) != Some(caller) {
            return Err(LockError::NotOwner(id).into());
        }
        let (acc, last) = self.staking.settled(env.block)?;
        let stake_amount = self
            .staking
            .stake_amount
            .checked_add(balance.amount)
            .ok_or(StakeError::ArithmeticOverflow)?;
        self.positions.transfer(caller, self.escrow_account, id)?;

        self.staking.reward.acc_reward_per_share = acc;
        self.staking.reward.last_touch_block = last;
        self.staking.next_staking_id += 1;
        self.staking.statuses.insert(
            id,
            StakingStatus {
                staking_id: self.staking.next_staking_id,
                lock_amount: balance.amount,
                last_ve: weight_at(balance, now),
                last_touch_acc: acc,
            },
        );
        self.staking.staked.insert(caller, id);
        self.staking.staked_owner.insert(id, caller);
        self.staking.stake_amount = stake_amount;
        debug!(nft_id = id, amount = balance.amount, "staking: position staked");
        Ok(())
    }

    /// Pay out `caller`'s accrued rewards and resynchronize its share
    /// weight to the lock's current voting weight (picking up decay and any
    /// interim amount or duration changes). Returns the amount paid; zero
    /// pending is a successful no-op.
    pub fn collect(&mut self, caller: AccountId, env: &Env) -> Result<Amount, VeError> {
        let id = *self.staking.staked.get(&caller).ok_or(StakeError::NotStaked)?;
        let (acc, last) = self.staking.settled(env.block)?;
        let status = self
            .staking
            .statuses
            .get(&id)
            .copied()
            .ok_or(StakeError::NotStaked)?;
        let pending = self.staking.pending(&status, acc)?;
        let lock = self.locked.get(&id).copied().unwrap_or_default();
        if pending > 0 {
            self.token.transfer(self.staking.reward.provider, caller, pending)?;
        }
        self.staking.reward.acc_reward_per_share = acc;
        self.staking.reward.last_touch_block = last;
        if let Some(status) = self.staking.statuses.get_mut(&id) {
            status.last_ve = weight_at(lock, env.timestamp);
            status.last_touch_acc = acc;
        }
        debug!(nft_id = id, paid = pending, "staking: rewards collected");
        Ok(pending)
    }

    /// Collect and return the staked position to `caller`.
    ///
    /// The record stays behind with `staking_id == 0`; the lock-amount
    /// snapshot leaves the accumulator denominator. Returns the reward
    /// paid.
    pub fn un_stake(&mut self, caller: AccountId, env: &Env) -> Result<Amount, VeError> {
        let id = *self.staking.staked.get(&caller).ok_or(StakeError::NotStaked)?;
        let (acc, last) = self.staking.settled(env.block)?;
        let status = self
            .staking
            .statuses
            .get(&id)
            .copied()
            .ok_or(StakeError::NotStaked)?;
        let pending = self.staking.pending(&status, acc)?;
        let stake_amount = self
            .staking
            .stake_amount
            .checked_sub(status.lock_amount)
            .ok_or(StakeError::ArithmeticOverflow)?;
        if pending > 0 {
            self.token.transfer(self.staking.reward.provider, caller, pending)?;
        }
        self.positions.transfer(self.escrow_account, caller, id)?;

        self.staking.reward.acc_reward_per_share = acc;
        self.staking.reward.last_touch_block = last;
        if let Some(status) = self.staking.statuses.get_mut(&id) {
            status.staking_id = 0;
            status.last_touch_acc = acc;
        }
        self.staking.staked.remove(&caller);
        self.staking.staked_owner.remove(&id);
        self.staking.stake_amount = stake_amount;
        debug!(nft_id = id, paid = pending, "staking: position unstaked");
        Ok(pending)
    }

    // --- pool administration ---

    /// Change the per-block emission. Settles with the old rate first.
    pub fn modify_reward_per_block(
        &mut self,
        caller: AccountId,
        rate: Amount,
        env: &Env,
    ) -> Result<(), VeError> {
        self.require_admin(caller)?;
        self.staking.touch(env.block)?;
        self.staking.reward.reward_per_block = rate;
        debug!(rate, "staking: reward per block modified");
        Ok(())
    }

    /// Move the accrual end block. Settles with the old end first, so
    /// blocks past an already-passed end stay unrewarded.
    pub fn modify_end_block(
        &mut self,
        caller: AccountId,
        end_block: BlockNumber,
        env: &Env,
    ) -> Result<(), VeError> {
        self.require_admin(caller)?;
        self.staking.touch(env.block)?;
        self.staking.reward.end_block = end_block;
        debug!(end_block, "staking: end block modified");
        Ok(())
    }

    /// Move the accrual start block. Only allowed while accrual has not
    /// begun, and only to a block still in the future.
    pub fn modify_start_block(
        &mut self,
        caller: AccountId,
        start_block: BlockNumber,
        env: &Env,
    ) -> Result<(), VeError> {
        self.require_admin(caller)?;
        if env.block >= self.staking.reward.start_block || start_block <= env.block {
            return Err(StakeError::InvalidStartBlock(start_block).into());
        }
        self.staking.reward.start_block = start_block;
        self.staking.reward.last_touch_block = start_block;
        debug!(start_block, "staking: start block modified");
        Ok(())
    }

    /// Change the account rewards are paid from.
    pub fn modify_provider(&mut self, caller: AccountId, provider: AccountId) -> Result<(), VeError> {
        self.require_admin(caller)?;
        self.staking.reward.provider = provider;
        Ok(())
    }

    // --- reads ---

    /// Settlement record of position `id`, if it was ever staked. Survives
    /// unstake with `staking_id == 0`.
    pub fn staking_status(&self, id: NftId) -> Option<StakingStatus> {
        self.staking.statuses.get(&id).copied()
    }

    /// Pool configuration and accumulator state.
    pub fn reward_info(&self) -> RewardInfo {
        self.staking.reward
    }

    /// The position `account` currently has staked.
    pub fn staked_nft(&self, account: AccountId) -> Option<NftId> {
        self.staking.staked.get(&account).copied()
    }

    /// Original owner of a staked position.
    pub fn staked_nft_owner(&self, id: NftId) -> Option<AccountId> {
        self.staking.staked_nft_owner(id)
    }

    /// Current accumulator denominator.
    pub fn stake_amount(&self) -> Amount {
        self.staking.stake_amount
    }

    fn require_admin(&self, caller: AccountId) -> Result<(), StakeError> {
        if caller != self.staking.admin {
            return Err(StakeError::NotRewardOwner);
        }
        Ok(())
    }
}
