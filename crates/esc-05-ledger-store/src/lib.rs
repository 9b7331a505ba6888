//! # ESC-05 Ledger Store
//!
//! Offers, trades, deposit queues, payouts and the processed-block watermark.
//!
//! **Subsystem ID:** 5
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Row Lifecycles
//!
//! | Table | Transitions |
//! |-------|-------------|
//! | `Offer` | Active(1) → Traded(3) or Canceled(2), terminal |
//! | `NftIncomingTransaction` | Pending(0) → Registered(1) or Failed(2) |
//! | `QuoteIncomingTransaction` | Pending(0) → Registered(1) or Failed(2) |
//! | `QuoteOutgoingTransaction` | Enqueued Pending(0); advanced by the payout deliverer |
//! | `UniqueProcessedBlock` | Insert-if-absent, never updated |
//!
//! The store applies no triggers. Every flip is a conditional update on the
//! current status so concurrent units cannot apply one transition twice.
//!
//! ## Module Structure
//!
//! ```text
//! esc-05-ledger-store/
//! ├── domain/      # Row types, status codes, LedgerError
//! ├── ports/       # LedgerStore (outbound)
//! ├── adapters/    # InMemoryLedger, PgLedger (feature "postgres")
//! └── config.rs    # LedgerConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::InMemoryLedger;
#[cfg(feature = "postgres")]
pub use adapters::PgLedger;
pub use config::LedgerConfig;
pub use domain::{
    LedgerError, NftDeposit, Offer, OfferStatus, Payout, PayoutStatus, ProcessedBlock,
    QuoteDeposit, Trade, TxStatus, WithdrawType,
};
pub use ports::LedgerStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
