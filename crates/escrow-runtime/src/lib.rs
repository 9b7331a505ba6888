//! # Escrow Runtime Library
//!
//! Configuration, key derivation, logging setup and wiring for the escrow
//! binary. The entry point is `main.rs`.
//!
//! ## Startup Sequence
//!
//! 1. Load [`EscrowConfig`] from the environment and validate it
//! 2. Install logging
//! 3. Derive admin keys, connect the chain node and the ledger
//! 4. Run the reconciliation engine until Ctrl+C

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod keys;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, EscrowConfig, LogConfig, OtherAdmins};
pub use keys::{AdminKeys, KeyError};
pub use logging::init_logging;
pub use runtime::EscrowRuntime;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
