//! # Shared Types Crate
//!
//! Cross-subsystem types for the marketplace escrow.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: ids, balances and chain views are defined once here.
//! - **Normalized chain views**: the classifier never sees client-library wrapper
//!   objects, only the typed `BlockView` / `ExtrinsicView` / `EventRecord` model.
//! - **Opaque keys**: accounts are raw 32-byte public keys; address encodings
//!   (SS58 and friends) live outside the core.

pub mod calls;
pub mod chain;
pub mod errors;
pub mod ids;

pub use calls::*;
pub use chain::*;
pub use errors::*;
pub use ids::*;
