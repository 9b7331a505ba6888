//! Cross-subsystem scenarios.

pub mod catch_up;
pub mod keys_and_units;
pub mod payload;
pub mod settlement;
