//! Coarse-grained sharing and all-or-nothing batches.
//!
//! The engine is single-writer. [`SharedEscrow`] serializes concurrent
//! hosts behind one `parking_lot::Mutex`; [`VeEscrow::transact`] applies a
//! closure to a clone and commits only on success, so a batch that fails
//! half-way discards every intermediate checkpoint and transfer.

use std::sync::Arc;

use parking_lot::Mutex;

use velock_core::error::VeError;
use velock_core::positions::PositionRegistry;
use velock_core::token::TokenLedger;

use crate::escrow::VeEscrow;

impl<T, N> VeEscrow<T, N>
where
    T: TokenLedger + Clone,
    N: PositionRegistry + Clone,
{
    /// Run `f` against a draft of the engine, committing only if it
    /// returns `Ok`. State (including the external ledgers the engine
    /// owns) is untouched on error.
    pub fn transact<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, VeError>,
    ) -> Result<R, VeError> {
        let mut draft = self.clone();
        let out = f(&mut draft)?;
        *self = draft;
        Ok(out)
    }
}

/// Shared handle to an engine, serialized by a mutex.
pub struct SharedEscrow<T, N> {
    inner: Arc<Mutex<VeEscrow<T, N>>>,
}

impl<T, N> Clone for SharedEscrow<T, N> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: TokenLedger, N: PositionRegistry> SharedEscrow<T, N> {
    pub fn new(engine: VeEscrow<T, N>) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut VeEscrow<T, N>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velock_core::constants::{MAXTIME, WEEK};
    use velock_core::error::{LockError, StakeError};
    use velock_core::positions::MemoryPositionRegistry;
    use velock_core::token::MemoryTokenLedger;
    use velock_core::types::{AccountId, Env, Timestamp};

    use crate::staking::RewardConfig;

    const BASE: Timestamp = WEEK * 1000;

    fn acct(seed: u8) -> AccountId {
        AccountId([seed; 32])
    }

    fn escrow() -> VeEscrow<MemoryTokenLedger, MemoryPositionRegistry> {
        let escrow_account = acct(0xEE);
        let mut token = MemoryTokenLedger::new();
        for seed in 1..4 {
            token.mint(acct(seed), 1_000 * MAXTIME as u128).unwrap();
            token.approve(acct(seed), escrow_account, u128::MAX).unwrap();
        }
        VeEscrow::new(
            token,
            MemoryPositionRegistry::new(),
            escrow_account,
            acct(0xAD),
            RewardConfig {
                provider: acct(0xAD),
                reward_per_block: 0,
                start_block: 0,
                end_block: u64::MAX,
            },
            &Env::new(BASE, 0),
        )
    }

    #[test]
    fn failed_batch_discards_everything() {
        let mut ve = escrow();
        let env = Env::new(BASE, 1);
        let epoch = ve.epoch();
        let balance = ve.token().balance_of(acct(1));

        // Lock succeeds inside the draft, then the stake of a foreign
        // position fails: nothing survives, not even the lock.
        let result = ve.transact(|draft| {
            let id = draft.create_lock(acct(1), 10 * MAXTIME as u128, BASE + WEEK * 10, &env)?;
            let foreign = draft.create_lock(acct(2), 10 * MAXTIME as u128, BASE + WEEK * 10, &env)?;
            draft.stake(acct(1), foreign, &env)?;
            Ok(id)
        });
        assert!(matches!(result, Err(VeError::Lock(LockError::NotOwner(_)))));
        assert_eq!(ve.epoch(), epoch);
        assert_eq!(ve.nft_count(), 0);
        assert_eq!(ve.token().balance_of(acct(1)), balance);
    }

    #[test]
    fn successful_batch_commits_once() {
        let mut ve = escrow();
        let env = Env::new(BASE, 1);
        let id = ve
            .transact(|draft| {
                let id = draft.create_lock(acct(1), 10 * MAXTIME as u128, BASE + WEEK * 10, &env)?;
                draft.stake(acct(1), id, &env)?;
                Ok(id)
            })
            .unwrap();
        assert_eq!(ve.staked_nft(acct(1)), Some(id));
        assert_eq!(ve.stake_amount(), 10 * MAXTIME as u128);
    }

    #[test]
    fn shared_handle_serializes_writers() {
        let shared = SharedEscrow::new(escrow());
        let env = Env::new(BASE, 1);
        let mut handles = Vec::new();
        for seed in 1..4u8 {
            let shared = shared.clone();
            handles.push(std::thread::spawn(move || {
                shared.with(|ve| {
                    ve.create_lock(acct(seed), 10 * MAXTIME as u128, BASE + WEEK * 10, &env)
                })
            }));
        }
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        shared.with(|ve| {
            assert_eq!(ve.nft_count(), 3);
            assert_eq!(ve.stake_amount(), 0);
        });
    }

    #[test]
    fn single_op_errors_need_no_transact() {
        let mut ve = escrow();
        let env = Env::new(BASE, 1);
        assert!(matches!(
            ve.un_stake(acct(1), &env),
            Err(VeError::Stake(StakeError::NotStaked))
        ));
    }
}
