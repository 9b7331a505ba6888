//! # Error Types
//!
//! Errors raised by the shared encoding helpers.

use thiserror::Error;

/// Public key / amount encoding failures.
///
/// Raised when a ledger row carries secondary data that cannot be turned back
/// into a chain value (malformed public key, non-decimal amount).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Input was not valid base64.
    #[error("invalid base64 public key: {0}")]
    InvalidBase64(String),

    /// Input was not valid hex.
    #[error("invalid hex public key: {0}")]
    InvalidHex(String),

    /// Decoded key had the wrong length.
    #[error("public key must be 32 bytes, got {0}")]
    InvalidLength(usize),

    /// Amount text was not a decimal integer.
    #[error("invalid decimal amount: {0}")]
    InvalidAmount(String),
}
