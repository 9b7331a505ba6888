//! # Matcher Call Payloads
//!
//! Call data of a matcher contract call starts with a 4-byte selector. The
//! listing call carries its arguments inline, little-endian (SCALE):
//!
//! ```text
//! offset  0   4          12         20         28               44
//!         sel collection token      quote      price (u128)
//! 0x 020f741e 0300000000000000 1200000000000000 0200000000000000 0080c6a47e8d03000000000000000000
//! ```
//!
//! Bytes past offset 44 are ignored.

use crate::domain::ClassifyError;

/// Listing (`ask`) selector.
pub const LISTING_SELECTOR: [u8; 4] = [0x02, 0x0f, 0x74, 0x1e];
/// Purchase (`buy`) selector.
pub const PURCHASE_SELECTOR: [u8; 4] = [0x15, 0xd6, 0x28, 0x01];
/// Cancel selector.
pub const CANCEL_SELECTOR: [u8; 4] = [0x97, 0x96, 0xe9, 0xa7];
/// Withdraw selector.
pub const WITHDRAW_SELECTOR: [u8; 4] = [0x41, 0x0f, 0xcc, 0x9d];

/// Length of a listing payload including the selector.
pub const LISTING_PAYLOAD_LEN: usize = 44;

/// Matcher call kinds the escrow reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherCall {
    /// Listing.
    Listing,
    /// Purchase.
    Purchase,
    /// Cancel.
    Cancel,
    /// Withdraw.
    Withdraw,
}

impl MatcherCall {
    /// Identify the call from its leading selector.
    pub fn from_data(data: &[u8]) -> Option<Self> {
        let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
        match selector {
            LISTING_SELECTOR => Some(MatcherCall::Listing),
            PURCHASE_SELECTOR => Some(MatcherCall::Purchase),
            CANCEL_SELECTOR => Some(MatcherCall::Cancel),
            WITHDRAW_SELECTOR => Some(MatcherCall::Withdraw),
            _ => None,
        }
    }

    /// Name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            MatcherCall::Listing => "listing",
            MatcherCall::Purchase => "purchase",
            MatcherCall::Cancel => "cancel",
            MatcherCall::Withdraw => "withdraw",
        }
    }
}

/// Arguments of a listing call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListingPayload {
    /// Collection.
    pub collection_id: u64,
    /// Token.
    pub token_id: u64,
    /// Quote currency.
    pub quote_id: u64,
    /// Asking price.
    pub price: u128,
}

/// Encode a listing call, selector included.
pub fn encode_listing_payload(payload: &ListingPayload) -> Vec<u8> {
    let mut data = Vec::with_capacity(LISTING_PAYLOAD_LEN);
    data.extend_from_slice(&LISTING_SELECTOR);
    data.extend_from_slice(&payload.collection_id.to_le_bytes());
    data.extend_from_slice(&payload.token_id.to_le_bytes());
    data.extend_from_slice(&payload.quote_id.to_le_bytes());
    data.extend_from_slice(&payload.price.to_le_bytes());
    data
}

/// Decode a listing call, selector included.
///
/// # Errors
/// `MalformedPayload` if the selector is wrong or the data is too short.
pub fn decode_listing_payload(data: &[u8]) -> Result<ListingPayload, ClassifyError> {
    if data.get(..4) != Some(&LISTING_SELECTOR[..]) {
        return Err(ClassifyError::MalformedPayload(format!(
            "not a listing call: 0x{}",
            hex::encode(data.get(..4).unwrap_or(data))
        )));
    }
    if data.len() < LISTING_PAYLOAD_LEN {
        return Err(ClassifyError::MalformedPayload(format!(
            "{} bytes, expected at least {}",
            data.len(),
            LISTING_PAYLOAD_LEN
        )));
    }

    Ok(ListingPayload {
        collection_id: read_u64(data, 4)?,
        token_id: read_u64(data, 12)?,
        quote_id: read_u64(data, 20)?,
        price: read_u128(data, 28)?,
    })
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ClassifyError> {
    data.get(offset..offset + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| ClassifyError::MalformedPayload(format!("no u64 at offset {offset}")))
}

fn read_u128(data: &[u8], offset: usize) -> Result<u128, ClassifyError> {
    data.get(offset..offset + 16)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u128::from_le_bytes)
        .ok_or_else(|| ClassifyError::MalformedPayload(format!("no u128 at offset {offset}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CHAIN_SAMPLE: &str = "020f741e030000000000000012000000000000000200000000000000";
    const CHAIN_SAMPLE_PRICE: &str = "0080c6a47e8d03000000000000000000";

    #[test]
    fn test_decodes_payload_seen_on_chain() {
        let data = hex::decode(format!("{CHAIN_SAMPLE}{CHAIN_SAMPLE_PRICE}")).unwrap();
        let payload = decode_listing_payload(&data).unwrap();
        assert_eq!(
            payload,
            ListingPayload {
                collection_id: 3,
                token_id: 18,
                quote_id: 2,
                price: 1_000_000_000_000_000,
            }
        );
    }

    #[test]
    fn test_listing_round_trip() {
        let payload = ListingPayload {
            collection_id: 3,
            token_id: 18,
            quote_id: 2,
            price: 1_000_000_000_000,
        };
        let data = encode_listing_payload(&payload);
        assert_eq!(data.len(), LISTING_PAYLOAD_LEN);
        assert_eq!(MatcherCall::from_data(&data), Some(MatcherCall::Listing));
        assert_eq!(decode_listing_payload(&data).unwrap(), payload);
    }

    #[test]
    fn test_short_payload_rejected() {
        let data = hex::decode(CHAIN_SAMPLE).unwrap();
        assert!(matches!(
            decode_listing_payload(&data),
            Err(ClassifyError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_selectors() {
        assert_eq!(
            MatcherCall::from_data(&hex::decode("15d6280100").unwrap()),
            Some(MatcherCall::Purchase)
        );
        assert_eq!(
            MatcherCall::from_data(&hex::decode("9796e9a703000000000000000100000000000000").unwrap()),
            Some(MatcherCall::Cancel)
        );
        assert_eq!(
            MatcherCall::from_data(&WITHDRAW_SELECTOR),
            Some(MatcherCall::Withdraw)
        );
        assert_eq!(MatcherCall::from_data(&[0x02, 0x0f]), None);
        assert_eq!(MatcherCall::from_data(&[0xde, 0xad, 0xbe, 0xef]), None);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            collection_id in any::<u64>(),
            token_id in any::<u64>(),
            quote_id in any::<u64>(),
            price in any::<u128>(),
        ) {
            let payload = ListingPayload { collection_id, token_id, quote_id, price };
            prop_assert_eq!(decode_listing_payload(&encode_listing_payload(&payload)).unwrap(), payload);
        }

        #[test]
        fn prop_truncated_payload_never_panics(len in 0usize..LISTING_PAYLOAD_LEN) {
            let data = encode_listing_payload(&ListingPayload {
                collection_id: 1, token_id: 2, quote_id: 3, price: 4,
            });
            prop_assert!(decode_listing_payload(&data[..len]).is_err());
        }
    }
}
