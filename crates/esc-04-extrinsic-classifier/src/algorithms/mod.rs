//! # Algorithms Module
//!
//! Payload codec and the classification rules.

pub mod classify;
pub mod payload;

pub use classify::{classify, classify_block, succeeded, Classified};
pub use payload::{
    decode_listing_payload, encode_listing_payload, ListingPayload, MatcherCall,
    CANCEL_SELECTOR, LISTING_PAYLOAD_LEN, LISTING_SELECTOR, PURCHASE_SELECTOR, WITHDRAW_SELECTOR,
};
