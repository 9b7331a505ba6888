//! # Domain Module
//!
//! Admin identities and the rotation bookkeeping behind the pool.

pub mod identity;
pub mod rotation;

pub use identity::{AdminIdentity, SecretSeed};
pub use rotation::{KeyIndex, RotationTable, PRIMARY_INDEX};
