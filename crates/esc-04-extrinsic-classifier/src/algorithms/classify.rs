//! # Classification
//!
//! Decide which escrow action, if any, a successful extrinsic represents.
//!
//! | Call | Needs | Action |
//! |------|-------|--------|
//! | `nft.transfer` to escrow admin | - | `NftDeposited` |
//! | matcher listing | payload | `AskPlaced` |
//! | matcher purchase | `WithdrawNFT` then `WithdrawQuoteMatched` | `Purchased` |
//! | matcher cancel | `WithdrawNFT` | `Cancelled` |
//! | matcher withdraw | `WithdrawQuoteUnused` | `QuoteWithdrawn` |
//!
//! Contract events count only when emitted by the matcher during the same
//! extrinsic. An extrinsic without `ExtrinsicSuccess` yields nothing.

use shared_types::{
    AccountId, Balance, BlockView, CallView, ChainEvent, EventRecord, ExtrinsicView, MatcherEvent,
};
use tracing::trace;

use super::payload::{decode_listing_payload, MatcherCall};
use crate::domain::{ClassifierContext, ClassifyError, EscrowAction};

/// Result of classifying one extrinsic of a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    /// Extrinsic index in the block.
    pub index: u32,
    /// The action, or why the call could not be turned into one.
    pub result: Result<EscrowAction, ClassifyError>,
}

/// Classify a single extrinsic.
///
/// # Errors
/// A call that matched an escrow signature but lacks a required event, a
/// well-formed payload, or a signer.
pub fn classify(
    extrinsic: &ExtrinsicView,
    index: u32,
    events: &[EventRecord],
    ctx: &ClassifierContext,
) -> Result<Option<EscrowAction>, ClassifyError> {
    if !succeeded(events, index) {
        return Ok(None);
    }

    match &extrinsic.call {
        CallView::NftTransfer {
            recipient,
            collection_id,
            token_id,
            ..
        } if *recipient == ctx.escrow_admin => {
            let sender = extrinsic.signer.ok_or(ClassifyError::MissingSigner(index))?;
            Ok(Some(EscrowAction::NftDeposited {
                sender,
                collection_id: *collection_id,
                token_id: *token_id,
            }))
        }
        CallView::ContractCall { dest, data, .. } if *dest == ctx.matcher => {
            let Some(kind) = MatcherCall::from_data(data) else {
                trace!("[esc-04] Ignoring matcher call with unknown selector at index {}", index);
                return Ok(None);
            };
            classify_matcher_call(kind, extrinsic, data, index, events, ctx).map(Some)
        }
        _ => Ok(None),
    }
}

/// Classify every extrinsic of a block, keeping only escrow-relevant ones.
pub fn classify_block(block: &BlockView, ctx: &ClassifierContext) -> Vec<Classified> {
    block
        .extrinsics
        .iter()
        .enumerate()
        .filter_map(|(position, extrinsic)| {
            let index = u32::try_from(position).ok()?;
            match classify(extrinsic, index, &block.events, ctx) {
                Ok(None) => None,
                Ok(Some(action)) => Some(Classified {
                    index,
                    result: Ok(action),
                }),
                Err(e) => Some(Classified {
                    index,
                    result: Err(e),
                }),
            }
        })
        .collect()
}

fn classify_matcher_call(
    kind: MatcherCall,
    extrinsic: &ExtrinsicView,
    data: &[u8],
    index: u32,
    events: &[EventRecord],
    ctx: &ClassifierContext,
) -> Result<EscrowAction, ClassifyError> {
    let matcher_events = matcher_events(events, index, &ctx.matcher);
    let missing = |event: &'static str| ClassifyError::MissingEvent {
        call: kind.name(),
        event,
        index,
    };

    match kind {
        MatcherCall::Listing => {
            let payload = decode_listing_payload(data)?;
            let seller = extrinsic.signer.ok_or(ClassifyError::MissingSigner(index))?;
            Ok(EscrowAction::AskPlaced {
                seller,
                collection_id: payload.collection_id,
                token_id: payload.token_id,
                quote_id: payload.quote_id,
                price: Balance::from(payload.price),
            })
        }
        MatcherCall::Purchase => {
            let nft_position = matcher_events
                .iter()
                .position(|event| matches!(event, MatcherEvent::WithdrawNft { .. }))
                .ok_or_else(|| missing("WithdrawNFT"))?;
            let MatcherEvent::WithdrawNft {
                owner: buyer,
                collection_id,
                token_id,
            } = matcher_events[nft_position]
            else {
                return Err(missing("WithdrawNFT"));
            };
            let (seller, quote_id, price) = matcher_events[nft_position + 1..]
                .iter()
                .find_map(|event| match event {
                    MatcherEvent::WithdrawQuoteMatched {
                        seller,
                        quote_id,
                        amount,
                    } => Some((*seller, *quote_id, *amount)),
                    _ => None,
                })
                .ok_or_else(|| missing("WithdrawQuoteMatched"))?;

            Ok(EscrowAction::Purchased {
                buyer: *buyer,
                seller,
                collection_id: *collection_id,
                token_id: *token_id,
                quote_id,
                price,
            })
        }
        MatcherCall::Cancel => matcher_events
            .iter()
            .find_map(|event| match event {
                MatcherEvent::WithdrawNft {
                    owner,
                    collection_id,
                    token_id,
                } => Some(EscrowAction::Cancelled {
                    seller: *owner,
                    collection_id: *collection_id,
                    token_id: *token_id,
                }),
                _ => None,
            })
            .ok_or_else(|| missing("WithdrawNFT")),
        MatcherCall::Withdraw => matcher_events
            .iter()
            .find_map(|event| match event {
                MatcherEvent::WithdrawQuoteUnused {
                    withdrawer,
                    quote_id,
                    amount,
                } => Some(EscrowAction::QuoteWithdrawn {
                    withdrawer: *withdrawer,
                    quote_id: *quote_id,
                    amount: *amount,
                }),
                _ => None,
            })
            .ok_or_else(|| missing("WithdrawQuoteUnused")),
    }
}

/// Whether the extrinsic at `index` reported `ExtrinsicSuccess`.
pub fn succeeded(events: &[EventRecord], index: u32) -> bool {
    events
        .iter()
        .any(|record| record.applies_to(index) && record.event == ChainEvent::ExtrinsicSuccess)
}

/// Decoded matcher events of the extrinsic at `index`, in emission order.
fn matcher_events<'a>(
    events: &'a [EventRecord],
    index: u32,
    matcher: &AccountId,
) -> Vec<&'a MatcherEvent> {
    events
        .iter()
        .filter(|record| record.applies_to(index))
        .filter_map(|record| match &record.event {
            ChainEvent::ContractEmitted {
                contract,
                event: Some(event),
            } if contract == matcher => Some(event),
            _ => None,
        })
        .collect()
}
