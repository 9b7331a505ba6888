//! # ESC-01 Signing Key Pool
//!
//! Group-aware leasing of escrow admin signing keys.
//!
//! **Subsystem ID:** 1
//! **Architecture:** Domain bookkeeping + async service
//!
//! ## Purpose
//!
//! Every outbound chain call is signed by an admin key. Keys are scoped:
//! contract admins may call the matcher, collection admins may move tokens of
//! one collection, and the primary escrow admin may do anything. The pool
//! keeps each key with at most one in-flight call.
//!
//! ## Leasing Rules
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Free secondary in group | Next one in round-robin order |
//! | No free secondary, primary free | Primary |
//! | Nothing free | Wait in FIFO order for the group |
//! | Primary released | Oldest waiter of any group |
//!
//! ## Module Structure
//!
//! ```text
//! esc-01-key-pool/
//! ├── domain/      # AdminIdentity, SecretSeed, RotationTable
//! └── service.rs   # KeyPool, KeyLease, KeyPoolBuilder
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod service;

// Re-exports
pub use domain::{AdminIdentity, KeyIndex, SecretSeed, PRIMARY_INDEX};
pub use service::{KeyLease, KeyPool, KeyPoolBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
