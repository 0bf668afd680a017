//! Integration test support for the Velock engine.

pub mod helpers;
