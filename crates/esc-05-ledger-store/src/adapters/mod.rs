//! Adapters (hexagonal architecture).

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryLedger;
#[cfg(feature = "postgres")]
pub use postgres::PgLedger;
