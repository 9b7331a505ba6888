//! # Application Layer
//!
//! The engine loop, deposit sweeps and stuck-token recovery.

pub mod engine;
pub mod recovery;
pub mod sweeps;

pub use engine::ReconciliationEngine;
pub use recovery::{RecoveryReport, StuckTokenRecovery};
pub use sweeps::REGISTERED_OK;
