//! # velock-curve
//! Pure math for the Velock engine: week-grid flooring, linear decay
//! segments, and the Q128 fixed-point reward accumulator. No state.

pub mod fixed;
pub mod segment;
