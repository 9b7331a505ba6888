//! # ESC-06 Reconciliation Engine
//!
//! Keeps the marketplace ledger in step with the chain.
//!
//! **Subsystem ID:** 6
//!
//! ## Control Flow
//!
//! ```text
//! head subscription ──► EngineState.best_block ──wake──► loop
//!                                                         │
//!   catch_up: scheduler.reserve ─► record watermark(n) ─► spawn(apply_block(n))
//!                                                                │
//!                 ChainGateway.read_block ─► classify_block ─► handlers
//!                                                               │
//!                                        LedgerStore  ◄─────────┤
//!                                        KeyPool.lease ─► ChainGateway.submit_call
//!   sweeps:   Pending deposits (paged past visited rows) ─► claim ─► scheduler.submit(register)
//! ```
//!
//! ## Failure Handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Ledger connection drop | Retried with a fixed delay until it succeeds or shutdown |
//! | Chain disconnect | Retried by the gateway after reconnecting |
//! | Missing settlement events | Action dropped, block stays recorded |
//! | No Active offer | Action dropped |
//! | Malformed key on a queued row | Row flipped to Failed |
//! | Registration call failed | Row left Pending for the next sweep |
//!
//! ## Module Structure
//!
//! ```text
//! esc-06-reconciliation/
//! ├── domain/       # ReconcileError, EngineState, deposit claims
//! ├── handlers/     # deposit, listing, purchase/cancel, withdraw
//! ├── application/  # engine loop, sweeps, stuck-token recovery
//! ├── config.rs     # EngineConfig, StartBlock, RecoveryMode
//! └── test_utils.rs # TestHarness, BlockBuilder
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod test_utils;

// Re-exports
pub use application::{
    RecoveryReport, ReconciliationEngine, StuckTokenRecovery, REGISTERED_OK,
};
pub use config::{EngineConfig, RecoveryMode, StartBlock};
pub use domain::{DepositClaim, EngineState, ReconcileError};
pub use handlers::SUPERSEDED_DEPOSIT;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
