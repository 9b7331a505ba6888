//! # ESC-04 Extrinsic Classifier
//!
//! Pure recognition of escrow protocol actions in fetched blocks.
//!
//! **Subsystem ID:** 4
//!
//! ## Purpose
//!
//! Given an extrinsic, its index and the block's events, return the typed
//! [`EscrowAction`] it represents, nothing, or a protocol violation when a
//! matcher call lacks its settlement events. No I/O happens here.
//!
//! ## Module Structure
//!
//! ```text
//! esc-04-extrinsic-classifier/
//! ├── domain/      # EscrowAction, ClassifierContext, ClassifyError
//! └── algorithms/  # classify, listing payload codec, selectors
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;

// Re-exports
pub use algorithms::{
    classify, classify_block, decode_listing_payload, encode_listing_payload, succeeded,
    Classified, ListingPayload, MatcherCall, CANCEL_SELECTOR, LISTING_PAYLOAD_LEN,
    LISTING_SELECTOR, PURCHASE_SELECTOR, WITHDRAW_SELECTOR,
};
pub use domain::{ClassifierContext, ClassifyError, EscrowAction};

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
