//! Ports (hexagonal architecture).

pub mod outbound;

pub use outbound::LedgerStore;
