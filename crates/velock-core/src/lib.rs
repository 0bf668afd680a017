//! # velock-core
//! Foundation types and traits for the Velock vote-escrow engine.

pub mod constants;
pub mod error;
pub mod positions;
pub mod token;
pub mod types;
