//! # Ledger Entities
//!
//! Row types of the marketplace tables. Status enums carry the integer codes
//! stored in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Balance, BlockNumber, CollectionId, QuoteId, TokenId};
use uuid::Uuid;

macro_rules! status_codes {
    ($name:ident { $($variant:ident = $code:expr),+ $(,)? }) => {
        impl $name {
            /// Integer code stored in the database.
            pub fn code(self) -> i32 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Map a stored code back to the status.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

/// Offer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Listed, awaiting purchase or cancellation.
    Active,
    /// Withdrawn by the seller.
    Canceled,
    /// Sold.
    Traded,
}

status_codes!(OfferStatus { Active = 1, Canceled = 2, Traded = 3 });

impl OfferStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, OfferStatus::Active)
    }
}

/// Incoming deposit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Awaiting registration with the matcher.
    Pending,
    /// Registered with the matcher.
    Registered,
    /// Superseded or rejected.
    Failed,
}

status_codes!(TxStatus { Pending = 0, Registered = 1, Failed = 2 });

/// Outgoing payout status, advanced by the payout deliverer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Enqueued.
    Pending,
    /// Delivered.
    Sent,
    /// Delivery failed.
    Failed,
}

status_codes!(PayoutStatus { Pending = 0, Sent = 1, Failed = 2 });

/// Why a payout is owed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawType {
    /// Unused quote balance withdrawn.
    Unused,
    /// Seller proceeds of a matched sale.
    Matched,
}

status_codes!(WithdrawType { Unused = 0, Matched = 1 });

/// `Offer` row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Row id.
    pub id: Uuid,
    /// Insert time.
    pub creation_date: DateTime<Utc>,
    /// Collection.
    pub collection_id: CollectionId,
    /// Token.
    pub token_id: TokenId,
    /// Asking price.
    pub price: Balance,
    /// Quote currency.
    pub quote_id: QuoteId,
    /// Seller key; stored base64 in `Seller` and raw in `SellerPublicKeyBytes`.
    pub seller: AccountId,
    /// Token metadata document, `Null` when unavailable.
    pub metadata: serde_json::Value,
    /// Lifecycle status.
    pub status: OfferStatus,
}

impl Offer {
    /// New Active offer.
    pub fn new(
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: Balance,
        seller: AccountId,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_date: Utc::now(),
            collection_id,
            token_id,
            price,
            quote_id,
            seller,
            metadata,
            status: OfferStatus::Active,
        }
    }
}

/// `Trade` row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Row id.
    pub id: Uuid,
    /// Settlement time.
    pub trade_date: DateTime<Utc>,
    /// Buyer key.
    pub buyer: AccountId,
    /// Settled offer.
    pub offer_id: Uuid,
}

impl Trade {
    /// Trade for `offer_id`, dated now.
    pub fn new(offer_id: Uuid, buyer: AccountId) -> Self {
        Self {
            id: Uuid::new_v4(),
            trade_date: Utc::now(),
            buyer,
            offer_id,
        }
    }
}

/// `NftIncomingTransaction` row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftDeposit {
    /// Row id.
    pub id: Uuid,
    /// Collection.
    pub collection_id: CollectionId,
    /// Token.
    pub token_id: TokenId,
    /// Transferred value, always zero for NFTs.
    pub value: Balance,
    /// Depositor key in base64. Kept as text: rows may hold malformed keys.
    pub owner_public_key: String,
    /// Block the deposit was seen in.
    pub source_block: BlockNumber,
    /// Registration status.
    pub status: TxStatus,
    /// Insert time.
    pub lock_time: Option<DateTime<Utc>>,
    /// Failure reason, empty when none.
    pub error_message: String,
    /// Offer created for this token after the deposit.
    pub offer_id: Option<Uuid>,
}

impl NftDeposit {
    /// New Pending deposit by `owner` seen in `source_block`.
    pub fn new(
        collection_id: CollectionId,
        token_id: TokenId,
        owner: &AccountId,
        source_block: BlockNumber,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection_id,
            token_id,
            value: Balance::zero(),
            owner_public_key: owner.to_base64(),
            source_block,
            status: TxStatus::Pending,
            lock_time: Some(Utc::now()),
            error_message: String::new(),
            offer_id: None,
        }
    }
}

/// `QuoteIncomingTransaction` row. Written by the deposit indexer, read and
/// flipped by the sweeps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDeposit {
    /// Row id.
    pub id: Uuid,
    /// Depositor key in hex, optional `0x` prefix.
    pub account_public_key: String,
    /// Deposited amount.
    pub amount: Balance,
    /// Quote currency.
    pub quote_id: QuoteId,
    /// Free text.
    pub description: String,
    /// Block the deposit was seen in.
    pub block_id: Option<BlockNumber>,
    /// Registration status.
    pub status: TxStatus,
    /// Insert time.
    pub lock_time: Option<DateTime<Utc>>,
    /// Failure reason, empty when none.
    pub error_message: String,
}

impl QuoteDeposit {
    /// New Pending deposit.
    pub fn new(account_public_key: impl Into<String>, amount: Balance, quote_id: QuoteId) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_public_key: account_public_key.into(),
            amount,
            quote_id,
            description: String::new(),
            block_id: None,
            status: TxStatus::Pending,
            lock_time: Some(Utc::now()),
            error_message: String::new(),
        }
    }
}

/// `QuoteOutgoingTransaction` row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Row id.
    pub id: Uuid,
    /// Delivery status.
    pub status: PayoutStatus,
    /// Failure reason, empty when none.
    pub error_message: String,
    /// Amount owed.
    pub value: Balance,
    /// Quote currency.
    pub quote_id: QuoteId,
    /// Recipient key, base64.
    pub recipient_public_key: String,
    /// Why it is owed.
    pub withdraw_type: WithdrawType,
}

impl Payout {
    /// New Pending payout.
    pub fn new(
        recipient: &AccountId,
        quote_id: QuoteId,
        value: Balance,
        withdraw_type: WithdrawType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: PayoutStatus::Pending,
            error_message: String::new(),
            value,
            quote_id,
            recipient_public_key: recipient.to_base64(),
            withdraw_type,
        }
    }
}

/// `UniqueProcessedBlock` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedBlock {
    /// Block height.
    pub block_number: BlockNumber,
    /// When processing started.
    pub processed_at: DateTime<Utc>,
}
