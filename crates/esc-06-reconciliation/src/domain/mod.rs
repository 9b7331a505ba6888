//! # Domain Layer
//!
//! Errors and shared engine state.

pub mod errors;
pub mod state;

pub use errors::ReconcileError;
pub use state::{DepositClaim, EngineState};
