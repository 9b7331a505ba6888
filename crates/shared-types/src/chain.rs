//! # Chain Views
//!
//! Normalized, typed view of a block as delivered by the chain gateway.
//! Numeric fields are plain integers or `Balance`, accounts are raw keys and
//! contract events arrive already decoded against the matcher ABI.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, Balance, BlockNumber, CollectionId, QuoteId, TokenId};

/// A fetched block: its extrinsics in order plus every event it emitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    /// Block height.
    pub number: BlockNumber,
    /// Block hash as reported by the node.
    #[serde(default)]
    pub hash: String,
    /// Extrinsics, indexed by position.
    pub extrinsics: Vec<ExtrinsicView>,
    /// All event records of the block.
    pub events: Vec<EventRecord>,
}

/// One extrinsic of a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrinsicView {
    /// Signer, absent for inherents.
    pub signer: Option<AccountId>,
    /// The dispatched call.
    pub call: CallView,
}

/// Call dispatched by an extrinsic, reduced to the shapes the escrow cares about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallView {
    /// `nft.transfer(recipient, collection_id, token_id, value)`.
    NftTransfer {
        recipient: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        #[serde(default)]
        value: u128,
    },
    /// `contracts.call(dest, value, gas_limit, data)`.
    ContractCall {
        dest: AccountId,
        #[serde(default)]
        value: u128,
        #[serde(default)]
        gas_limit: u64,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// Anything else.
    Other { pallet: String, method: String },
}

/// Phase an event was emitted in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Emitted while applying the extrinsic at this index.
    ApplyExtrinsic(u32),
    /// Block finalization.
    Finalization,
    /// Block initialization.
    Initialization,
}

/// An event together with its phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emission phase.
    pub phase: Phase,
    /// The event.
    pub event: ChainEvent,
}

impl EventRecord {
    /// True when the event was emitted by the extrinsic at `index`.
    pub fn applies_to(&self, index: u32) -> bool {
        self.phase == Phase::ApplyExtrinsic(index)
    }
}

/// Chain events relevant to the escrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainEvent {
    /// `system.ExtrinsicSuccess`.
    ExtrinsicSuccess,
    /// `system.ExtrinsicFailed`.
    ExtrinsicFailed,
    /// `contracts.ContractEmitted`; `event` is `None` when the payload did not
    /// decode against the matcher ABI.
    ContractEmitted {
        contract: AccountId,
        event: Option<MatcherEvent>,
    },
    /// Any other event.
    Other { pallet: String, method: String },
}

/// Decoded matcher contract events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum MatcherEvent {
    /// Token released from the contract to `owner` (buyer on purchase, seller on cancel).
    #[serde(rename = "WithdrawNFT")]
    WithdrawNft {
        owner: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    },
    /// Quote owed to the seller after a match.
    WithdrawQuoteMatched {
        seller: AccountId,
        quote_id: QuoteId,
        amount: Balance,
    },
    /// Unused quote balance withdrawn.
    WithdrawQuoteUnused {
        withdrawer: AccountId,
        quote_id: QuoteId,
        amount: Balance,
    },
    /// Any other contract event.
    #[serde(other)]
    Other,
}

impl MatcherEvent {
    /// ABI identifier of the event.
    pub fn identifier(&self) -> &'static str {
        match self {
            MatcherEvent::WithdrawNft { .. } => "WithdrawNFT",
            MatcherEvent::WithdrawQuoteMatched { .. } => "WithdrawQuoteMatched",
            MatcherEvent::WithdrawQuoteUnused { .. } => "WithdrawQuoteUnused",
            MatcherEvent::Other => "Other",
        }
    }
}

/// Serde helper: `Vec<u8>` as `0x`-prefixed hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as hex.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    /// Deserialize hex, prefix optional.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_to_matches_index_only() {
        let record = EventRecord {
            phase: Phase::ApplyExtrinsic(2),
            event: ChainEvent::ExtrinsicSuccess,
        };
        assert!(record.applies_to(2));
        assert!(!record.applies_to(1));

        let finalization = EventRecord {
            phase: Phase::Finalization,
            event: ChainEvent::ExtrinsicSuccess,
        };
        assert!(!finalization.applies_to(0));
    }

    #[test]
    fn test_contract_call_json_shape() {
        let json = r#"{
            "signer": null,
            "call": {"kind": "contract_call", "dest": "0x0000000000000000000000000000000000000000000000000000000000000000", "data": "0x020f741e"}
        }"#;
        let extrinsic: ExtrinsicView = serde_json::from_str(json).unwrap();
        match extrinsic.call {
            CallView::ContractCall { data, gas_limit, .. } => {
                assert_eq!(data, vec![0x02, 0x0f, 0x74, 0x1e]);
                assert_eq!(gas_limit, 0);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_unknown_matcher_event_maps_to_other() {
        let json = r#"{"name": "AskCreated", "foo": 1}"#;
        let event: MatcherEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, MatcherEvent::Other);
    }
}
