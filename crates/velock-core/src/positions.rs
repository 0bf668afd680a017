//! Non-fungible position registry interface and in-memory implementation.
//!
//! Each lock is represented by an NFT. The escrow mints one per
//! `create_lock`, takes custody of it while the position is staked, and
//! burns it when the position is destroyed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PositionError;
use crate::types::{AccountId, NftId};

/// Position (NFT) registry the escrow mints lock tokens into.
pub trait PositionRegistry: Send + Sync {
    /// Mint a new position token to `to`, returning its id. Ids start at 1
    /// and never repeat.
    fn mint(&mut self, to: AccountId) -> NftId;

    /// Current owner of `id`, or `None` if unknown or burned.
    fn owner_of(&self, id: NftId) -> Option<AccountId>;

    /// Move `id` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// - [`PositionError::UnknownToken`] if `id` does not exist
    /// - [`PositionError::NotTokenOwner`] if `from` does not own it
    fn transfer(&mut self, from: AccountId, to: AccountId, id: NftId) -> Result<(), PositionError>;

    /// Destroy `id`.
    ///
    /// # Errors
    ///
    /// [`PositionError::UnknownToken`] if `id` does not exist.
    fn burn(&mut self, id: NftId) -> Result<(), PositionError>;
}

/// In-memory position registry for testing. Sequential ids from 1.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MemoryPositionRegistry {
    owners: HashMap<NftId, AccountId>,
    next_id: NftId,
}

impl MemoryPositionRegistry {
    pub fn new() -> Self {
        Self { owners: HashMap::new(), next_id: 1 }
    }

    /// Number of live (minted, unburned) positions.
    pub fn live_count(&self) -> usize {
        self.owners.len()
    }
}

impl PositionRegistry for MemoryPositionRegistry {
    fn mint(&mut self, to: AccountId) -> NftId {
        let id = self.next_id;
        self.next_id += 1;
        self.owners.insert(id, to);
        id
    }

    fn owner_of(&self, id: NftId) -> Option<AccountId> {
        self.owners.get(&id).copied()
    }

    fn transfer(&mut self, from: AccountId, to: AccountId, id: NftId) -> Result<(), PositionError> {
        let owner = self.owners.get_mut(&id).ok_or(PositionError::UnknownToken(id))?;
        if *owner != from {
            return Err(PositionError::NotTokenOwner(id));
        }
        *owner = to;
        Ok(())
    }

    fn burn(&mut self, id: NftId) -> Result<(), PositionError> {
        self.owners.remove(&id).map(|_| ()).ok_or(PositionError::UnknownToken(id))
    }
}
