//! # Identifiers
//!
//! Account keys, asset ids and balances.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::EncodingError;

/// Block height on the watched chain.
pub type BlockNumber = u64;

/// NFT collection id.
pub type CollectionId = u64;

/// Token id within a collection.
pub type TokenId = u64;

/// Settlement currency id.
pub type QuoteId = u64;

/// Arbitrary-precision amount (prices, deposits, payouts).
pub type Balance = U256;

/// Parse a decimal amount as stored in the ledger.
pub fn parse_balance(text: &str) -> Result<Balance, EncodingError> {
    U256::from_dec_str(text.trim()).map_err(|_| EncodingError::InvalidAmount(text.to_string()))
}

/// Raw 32-byte account public key.
///
/// Serialized as `0x`-prefixed hex in JSON.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base64 form used by the Offer, Trade and NFT deposit tables.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Parse the base64 form.
    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| EncodingError::InvalidBase64(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Lowercase hex without prefix, as stored in quote deposit rows.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse hex with or without a `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self, EncodingError> {
        let trimmed = text.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| EncodingError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Build from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EncodingError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for AccountId {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let account = AccountId::new([7u8; 32]);
        let encoded = account.to_base64();
        assert_eq!(AccountId::from_base64(&encoded).unwrap(), account);
    }

    #[test]
    fn test_hex_accepts_prefix() {
        let account = AccountId::new([0xAB; 32]);
        let plain = account.to_hex();
        assert_eq!(AccountId::from_hex(&plain).unwrap(), account);
        assert_eq!(AccountId::from_hex(&format!("0x{plain}")).unwrap(), account);
    }

    #[test]
    fn test_rejects_short_key() {
        let err = AccountId::from_hex("0x0102").unwrap_err();
        assert_eq!(err, EncodingError::InvalidLength(2));
    }

    #[test]
    fn test_rejects_garbage_base64() {
        assert!(matches!(
            AccountId::from_base64("not base64!!"),
            Err(EncodingError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_json_uses_hex() {
        let account = AccountId::new([1u8; 32]);
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.starts_with("\"0x0101"));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance("1000000000000").unwrap(), U256::from(1_000_000_000_000u64));
        assert!(parse_balance("12.5").is_err());
    }
}
