//! The vote-escrow engine: lock registry and lifecycle operations.
//!
//! Every operation validates, prepares its checkpoint replay, performs the
//! external token/position transfers, and only then commits. A failure at
//! any step leaves both the engine and the external ledgers as they were
//! (token ledgers settle whole transfers or none).

use std::collections::HashMap;

use tracing::debug;

use velock_core::constants::{MAX_LOCK_AMOUNT, MAXTIME};
use velock_core::error::{LockError, StakeError, VeError};
use velock_core::types::{AccountId, Amount, Env, LockedBalance, NftId, Point, Timestamp};
use velock_core::positions::PositionRegistry;
use velock_core::token::TokenLedger;
use velock_curve::segment::{floor_to_week, LockSegment};

use crate::checkpoint::CheckpointLedger;
use crate::staking::{RewardConfig, StakingLedger};

/// The escrow engine.
///
/// Generic over the fungible-token ledger `T` it settles against and the
/// position registry `N` it mints lock NFTs into. Single-writer; wrap in
/// [`SharedEscrow`](crate::shared::SharedEscrow) for concurrent hosts.
#[derive(Clone, Debug)]
pub struct VeEscrow<T, N> {
    pub(crate) token: T,
    pub(crate) positions: N,
    /// Account holding escrowed tokens and staked NFTs.
    pub(crate) escrow_account: AccountId,
    pub(crate) locked: HashMap<NftId, LockedBalance>,
    /// Per-position curve snapshots, one per mutation, timestamps ascending.
    pub(crate) nft_points: HashMap<NftId, Vec<Point>>,
    pub(crate) ledger: CheckpointLedger,
    pub(crate) staking: StakingLedger,
    /// Total positions ever created (burned ones included).
    pub(crate) nft_count: u64,
}

impl<T: TokenLedger, N: PositionRegistry> VeEscrow<T, N> {
    /// Create an engine over the given ledgers.
    ///
    /// `escrow_account` is the custody account for locked tokens and staked
    /// positions; `admin` may reconfigure the reward pool. The checkpoint
    /// sentinel and reward accrual both start at `env`.
    pub fn new(
        token: T,
        positions: N,
        escrow_account: AccountId,
        admin: AccountId,
        reward: RewardConfig,
        env: &Env,
    ) -> Self {
        Self {
            token,
            positions,
            escrow_account,
            locked: HashMap::new(),
            nft_points: HashMap::new(),
            ledger: CheckpointLedger::new(env.timestamp),
            staking: StakingLedger::new(admin, reward, env),
            nft_count: 0,
        }
    }

    // --- operations ---

    /// Lock `amount` tokens of `caller` until `unlock_time` (floored to a
    /// week boundary) and mint the position NFT.
    ///
    /// Pulls tokens via `transfer_from`, so `caller` must have approved the
    /// escrow account.
    pub fn create_lock(
        &mut self,
        caller: AccountId,
        amount: Amount,
        unlock_time: Timestamp,
        env: &Env,
    ) -> Result<NftId, VeError> {
        let now = env.timestamp;
        let unlock = floor_to_week(unlock_time);
        if amount == 0 || amount > MAX_LOCK_AMOUNT {
            return Err(LockError::InvalidAmount(amount).into());
        }
        if unlock <= now || unlock > now + MAXTIME {
            return Err(LockError::InvalidDuration { unlock, now }.into());
        }

        let balance = LockedBalance::new(amount, unlock);
        let new = LockSegment::at(balance, now).map_err(VeError::from)?;
        let prepared = self.ledger.prepare_delta(now, &[(LockSegment::default(), new)])?;
        self.token
            .transfer_from(self.escrow_account, caller, self.escrow_account, amount)?;
        self.ledger.commit_delta(prepared);

        let id = self.positions.mint(caller);
        self.nft_count += 1;
        self.locked.insert(id, balance);
        self.push_point(id, new, now);
        debug!(nft_id = id, amount, unlock, "escrow: lock created");
        Ok(id)
    }

    /// Add `extra` tokens from `caller` to an active, unexpired lock.
    ///
    /// Callable by anyone; deposits into someone else's lock are
    /// donations. Deliberately does not resynchronize staking reward state;
    /// the next collect or unstake picks the larger weight up.
    pub fn increase_amount(
        &mut self,
        caller: AccountId,
        id: NftId,
        extra: Amount,
        env: &Env,
    ) -> Result<(), VeError> {
        let now = env.timestamp;
        let balance = self.active_lock(id)?;
        if balance.end <= now {
            return Err(LockError::InvalidDuration { unlock: balance.end, now }.into());
        }
        let amount = balance
            .amount
            .checked_add(extra)
            .filter(|total| *total <= MAX_LOCK_AMOUNT)
            .ok_or(LockError::InvalidAmount(extra))?;
        if extra == 0 {
            return Err(LockError::InvalidAmount(0).into());
        }

        let grown = LockedBalance::new(amount, balance.end);
        let old = LockSegment::at(balance, now)?;
        let new = LockSegment::at(grown, now)?;
        let prepared = self.ledger.prepare_delta(now, &[(old, new)])?;
        self.token
            .transfer_from(self.escrow_account, caller, self.escrow_account, extra)?;
        self.ledger.commit_delta(prepared);

        self.locked.insert(id, grown);
        self.push_point(id, new, now);
        debug!(nft_id = id, extra, total = amount, "escrow: amount increased");
        Ok(())
    }

    /// Extend a lock's unlock time to `new_unlock` (floored).
    ///
    /// The caller must own the position, or be the original owner of a
    /// staked position. The new end must strictly exceed the old one, lie
    /// in the future, and stay within `MAXTIME` of now; an expired lock can
    /// be resurrected this way.
    pub fn increase_unlock_time(
        &mut self,
        caller: AccountId,
        id: NftId,
        new_unlock: Timestamp,
        env: &Env,
    ) -> Result<(), VeError> {
        let now = env.timestamp;
        let balance = self.active_lock(id)?;
        let authorized = self.positions.owner_of(id) == Some(caller)
            || self.staking.staked_nft_owner(id) == Some(caller);
        if !authorized {
            return Err(LockError::NotOwner(id).into());
        }
        let unlock = floor_to_week(new_unlock);
        if unlock <= balance.end || unlock <= now || unlock > now + MAXTIME {
            return Err(LockError::InvalidDuration { unlock, now }.into());
        }

        let extended = LockedBalance::new(balance.amount, unlock);
        // An already-expired lock contributes nothing to the old side.
        let old = LockSegment::at(balance, now)?;
        let new = LockSegment::at(extended, now)?;
        let prepared = self.ledger.prepare_delta(now, &[(old, new)])?;
        self.ledger.commit_delta(prepared);

        self.locked.insert(id, extended);
        self.push_point(id, new, now);
        debug!(nft_id = id, unlock, "escrow: unlock time increased");
        Ok(())
    }

    /// Move all of `from`'s locked tokens into `to`.
    ///
    /// Caller must own both; neither may be staked; `to` must be unexpired
    /// and lock at least as long as `from`. `from` keeps its end timestamp
    /// with a zero amount and stays burnable.
    pub fn merge(
        &mut self,
        caller: AccountId,
        from: NftId,
        to: NftId,
        env: &Env,
    ) -> Result<(), VeError> {
        let now = env.timestamp;
        if from == to {
            return Err(LockError::InvalidMergeTarget { from, to }.into());
        }
        let from_balance = self.active_lock(from)?;
        let to_balance = *self.locked.get(&to).ok_or(LockError::UnknownPosition(to))?;
        for id in [from, to] {
            if self.staking.staked_nft_owner(id).is_some() {
                return Err(StakeError::PositionStaked(id).into());
            }
            if self.positions.owner_of(id) != Some(caller) {
                return Err(LockError::NotOwner(id).into());
            }
        }
        if to_balance.end <= now || to_balance.end < from_balance.end {
            return Err(LockError::InvalidMergeTarget { from, to }.into());
        }
        let amount = to_balance
            .amount
            .checked_add(from_balance.amount)
            .filter(|total| *total <= MAX_LOCK_AMOUNT)
            .ok_or(LockError::InvalidAmount(from_balance.amount))?;

        let drained = LockedBalance::new(0, from_balance.end);
        let grown = LockedBalance::new(amount, to_balance.end);
        let pairs = [
            (LockSegment::at(from_balance, now)?, LockSegment::at(drained, now)?),
            (LockSegment::at(to_balance, now)?, LockSegment::at(grown, now)?),
        ];
        let prepared = self.ledger.prepare_delta(now, &pairs)?;
        self.ledger.commit_delta(prepared);

        self.locked.insert(from, drained);
        self.locked.insert(to, grown);
        self.push_point(from, pairs[0].1, now);
        self.push_point(to, pairs[1].1, now);
        debug!(from, to, amount, "escrow: positions merged");
        Ok(())
    }

    /// Pay out an expired, unstaked lock to its owner. The position stays
    /// alive (zeroed) until [`burn`](Self::burn). Returns the amount paid.
    pub fn withdraw(&mut self, caller: AccountId, id: NftId, env: &Env) -> Result<Amount, VeError> {
        let now = env.timestamp;
        let balance = *self.locked.get(&id).ok_or(LockError::UnknownPosition(id))?;
        if self.staking.staked_nft_owner(id).is_some() {
            return Err(StakeError::PositionStaked(id).into());
        }
        if self.positions.owner_of(id) != Some(caller) {
            return Err(LockError::NotOwner(id).into());
        }
        if balance.end > now {
            return Err(LockError::NotExpired(id).into());
        }

        // The expired segment carries no bias or slope; the replay itself
        // still lands a checkpoint at `now`.
        let prepared = self.ledger.prepare(now)?;
        self.token.transfer(self.escrow_account, caller, balance.amount)?;
        self.ledger.commit(prepared);

        self.locked.insert(id, LockedBalance::new(0, 0));
        self.push_point(id, LockSegment::default(), now);
        debug!(nft_id = id, amount = balance.amount, "escrow: withdrawn");
        Ok(balance.amount)
    }

    /// Destroy a fully withdrawn position and burn its NFT.
    pub fn burn(&mut self, caller: AccountId, id: NftId) -> Result<(), VeError> {
        let balance = *self.locked.get(&id).ok_or(LockError::AlreadyBurned(id))?;
        if self.positions.owner_of(id) != Some(caller) {
            return Err(LockError::NotOwner(id).into());
        }
        if balance.amount != 0 {
            return Err(LockError::StillLocked(id).into());
        }
        self.positions.burn(id)?;
        self.locked.remove(&id);
        self.nft_points.remove(&id);
        debug!(nft_id = id, "escrow: position burned");
        Ok(())
    }

    /// Permissionless catch-up: advance the global curve to `env.timestamp`
    /// with no lock change.
    pub fn checkpoint(&mut self, env: &Env) -> Result<(), VeError> {
        self.ledger.checkpoint(env.timestamp)?;
        Ok(())
    }

    // --- reads ---

    /// The lock record behind `id`, if the position exists.
    pub fn nft_locked(&self, id: NftId) -> Option<LockedBalance> {
        self.locked.get(&id).copied()
    }

    /// Current checkpoint epoch.
    pub fn epoch(&self) -> u64 {
        self.ledger.epoch()
    }

    /// Global curve point at `epoch`.
    pub fn point_history(&self, epoch: u64) -> Option<Point> {
        self.ledger.point(epoch)
    }

    /// Aggregate voting weight at `t`. See
    /// [`CheckpointLedger::total_weight_at`].
    pub fn total_weight_at(&self, t: Timestamp) -> Result<u128, VeError> {
        Ok(self.ledger.total_weight_at(t)?)
    }

    /// Scheduled slope change at week boundary `t`.
    pub fn slope_change_at(&self, t: Timestamp) -> i128 {
        self.ledger.slope_change_at(t)
    }

    /// Total positions ever created.
    pub fn nft_count(&self) -> u64 {
        self.nft_count
    }

    /// Latest curve snapshot of position `id`.
    pub fn nft_point(&self, id: NftId) -> Option<Point> {
        self.nft_points.get(&id).and_then(|points| points.last().copied())
    }

    /// Voting weight of position `id` at time `t`, from its snapshot
    /// history. Zero before the position existed, after expiry, or for
    /// unknown ids.
    pub fn nft_weight_at(&self, id: NftId, t: Timestamp) -> u128 {
        let Some(points) = self.nft_points.get(&id) else {
            return 0;
        };
        let idx = points.partition_point(|p| p.timestamp <= t);
        if idx == 0 {
            return 0;
        }
        let p = points[idx - 1];
        let drop = p.slope.saturating_mul((t - p.timestamp) as i128);
        p.bias.saturating_sub(drop).max(0) as u128
    }

    /// The token ledger, for balance assertions and approvals.
    pub fn token(&self) -> &T {
        &self.token
    }

    /// Mutable token ledger access (approvals, test funding).
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    /// The position registry.
    pub fn positions(&self) -> &N {
        &self.positions
    }

    /// The escrow custody account.
    pub fn escrow_account(&self) -> AccountId {
        self.escrow_account
    }

    // --- internals ---

    /// Active (non-withdrawn) lock record or the matching error.
    pub(crate) fn active_lock(&self, id: NftId) -> Result<LockedBalance, LockError> {
        let balance = *self.locked.get(&id).ok_or(LockError::UnknownPosition(id))?;
        if balance.amount == 0 {
            return Err(LockError::InvalidAmount(0));
        }
        Ok(balance)
    }

    fn push_point(&mut self, id: NftId, segment: LockSegment, now: Timestamp) {
        self.nft_points.entry(id).or_default().push(Point {
            bias: segment.bias,
            slope: segment.slope,
            timestamp: now,
        });
    }
}
