//! # Outbound Calls
//!
//! Chain calls the escrow signs and submits, and the authorization groups
//! that decide which admin key may sign them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, Balance, CollectionId, QuoteId, TokenId};

/// Authorization scope of an admin signing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthGroup {
    /// May call the matcher contract.
    Contract,
    /// May move tokens of this collection.
    Collection(CollectionId),
}

impl fmt::Display for AuthGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthGroup::Contract => write!(f, "contracts"),
            AuthGroup::Collection(id) => write!(f, "collection-{id}"),
        }
    }
}

/// A call signed by an escrow admin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainCall {
    /// Move an escrowed token to `recipient`.
    NftTransfer {
        recipient: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        value: u128,
    },
    /// `matcher.register_nft_deposit(collection_id, token_id, owner)`.
    RegisterNftDeposit {
        matcher: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        owner: AccountId,
    },
    /// `matcher.register_deposit(quote_id, amount, depositor)`.
    RegisterQuoteDeposit {
        matcher: AccountId,
        quote_id: QuoteId,
        amount: Balance,
        depositor: AccountId,
    },
    /// `matcher.add_to_white_list(account)`.
    AddToWhitelist {
        matcher: AccountId,
        account: AccountId,
    },
}

impl ChainCall {
    /// Token transfer with zero value, the only shape the escrow sends.
    pub fn nft_transfer(recipient: AccountId, collection_id: CollectionId, token_id: TokenId) -> Self {
        ChainCall::NftTransfer {
            recipient,
            collection_id,
            token_id,
            value: 0,
        }
    }

    /// Group whose keys may sign this call.
    pub fn auth_group(&self) -> AuthGroup {
        match self {
            ChainCall::NftTransfer { collection_id, .. } => AuthGroup::Collection(*collection_id),
            ChainCall::RegisterNftDeposit { .. }
            | ChainCall::RegisterQuoteDeposit { .. }
            | ChainCall::AddToWhitelist { .. } => AuthGroup::Contract,
        }
    }
}

impl fmt::Display for ChainCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainCall::NftTransfer {
                recipient,
                collection_id,
                token_id,
                ..
            } => write!(f, "nft.transfer({recipient}, {collection_id}, {token_id})"),
            ChainCall::RegisterNftDeposit {
                collection_id,
                token_id,
                owner,
                ..
            } => write!(f, "matcher.register_nft_deposit({collection_id}, {token_id}, {owner})"),
            ChainCall::RegisterQuoteDeposit {
                quote_id,
                amount,
                depositor,
                ..
            } => write!(f, "matcher.register_deposit({quote_id}, {amount}, {depositor})"),
            ChainCall::AddToWhitelist { account, .. } => {
                write!(f, "matcher.add_to_white_list({account})")
            }
        }
    }
}
