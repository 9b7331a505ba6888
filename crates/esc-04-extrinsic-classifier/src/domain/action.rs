//! # Escrow Actions
//!
//! Typed records extracted from successful extrinsics.

use std::fmt;

use shared_types::{AccountId, Balance, CollectionId, QuoteId, TokenId};

/// An escrow protocol action found in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowAction {
    /// A token was transferred to the escrow admin.
    NftDeposited {
        /// Depositor (extrinsic signer).
        sender: AccountId,
        /// Collection.
        collection_id: CollectionId,
        /// Token.
        token_id: TokenId,
    },
    /// A listing call was made on the matcher.
    AskPlaced {
        /// Seller (extrinsic signer).
        seller: AccountId,
        /// Collection.
        collection_id: CollectionId,
        /// Token.
        token_id: TokenId,
        /// Quote currency.
        quote_id: QuoteId,
        /// Asking price.
        price: Balance,
    },
    /// A purchase settled on the matcher.
    Purchased {
        /// Buyer, receives the token.
        buyer: AccountId,
        /// Seller, owed the quote.
        seller: AccountId,
        /// Collection.
        collection_id: CollectionId,
        /// Token.
        token_id: TokenId,
        /// Quote currency.
        quote_id: QuoteId,
        /// Price paid.
        price: Balance,
    },
    /// A listing was cancelled; the token goes back to the seller.
    Cancelled {
        /// Seller.
        seller: AccountId,
        /// Collection.
        collection_id: CollectionId,
        /// Token.
        token_id: TokenId,
    },
    /// Unused quote balance was withdrawn.
    QuoteWithdrawn {
        /// Withdrawer.
        withdrawer: AccountId,
        /// Quote currency.
        quote_id: QuoteId,
        /// Amount withdrawn.
        amount: Balance,
    },
}

impl EscrowAction {
    /// Short action name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EscrowAction::NftDeposited { .. } => "deposit",
            EscrowAction::AskPlaced { .. } => "listing",
            EscrowAction::Purchased { .. } => "purchase",
            EscrowAction::Cancelled { .. } => "cancel",
            EscrowAction::QuoteWithdrawn { .. } => "withdraw",
        }
    }

    /// Token the action concerns, if any.
    pub fn token(&self) -> Option<(CollectionId, TokenId)> {
        match self {
            EscrowAction::NftDeposited {
                collection_id,
                token_id,
                ..
            }
            | EscrowAction::AskPlaced {
                collection_id,
                token_id,
                ..
            }
            | EscrowAction::Purchased {
                collection_id,
                token_id,
                ..
            }
            | EscrowAction::Cancelled {
                collection_id,
                token_id,
                ..
            } => Some((*collection_id, *token_id)),
            EscrowAction::QuoteWithdrawn { .. } => None,
        }
    }
}

impl fmt::Display for EscrowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscrowAction::QuoteWithdrawn {
                withdrawer,
                quote_id,
                amount,
            } => write!(f, "withdraw {amount} of quote {quote_id} by {withdrawer}"),
            other => match other.token() {
                Some((collection_id, token_id)) => {
                    write!(f, "{} of {collection_id}/{token_id}", other.kind())
                }
                None => write!(f, "{}", other.kind()),
            },
        }
    }
}
