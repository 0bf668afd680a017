//! # velock-escrow
//! The stateful vote-escrow engine: a global checkpoint ledger tracking the
//! aggregate voting-weight curve, the lock registry with its lifecycle
//! operations, and the staking reward pool.

pub mod checkpoint;
pub mod escrow;
pub mod shared;
pub mod staking;

pub use escrow::VeEscrow;
pub use shared::SharedEscrow;
