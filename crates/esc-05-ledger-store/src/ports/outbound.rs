//! # Outbound Ports
//!
//! The relational store behind the escrow. Status flips are conditional on the
//! current status so that concurrent units racing on the same row never apply
//! a transition twice; the `bool` results report whether this caller won.

use async_trait::async_trait;
use shared_types::{BlockNumber, CollectionId, QuoteId, TokenId};
use uuid::Uuid;

use crate::domain::{
    LedgerError, NftDeposit, Offer, OfferStatus, Payout, QuoteDeposit, Trade, TxStatus,
};

/// Ledger store - outbound port.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ---- watermark ----

    /// Highest recorded block, `None` on an empty table.
    async fn last_processed_block(&self) -> Result<Option<BlockNumber>, LedgerError>;

    /// Record `block` as attempted. Returns false if it was already recorded.
    async fn record_processed_block(&self, block: BlockNumber) -> Result<bool, LedgerError>;

    // ---- NFT deposits ----

    /// Mark every Pending deposit of the token Failed with `reason`.
    async fn fail_pending_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        reason: &str,
    ) -> Result<u64, LedgerError>;

    /// Delete deposits of the token that no offer references.
    async fn delete_orphan_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<u64, LedgerError>;

    /// Insert a deposit row.
    async fn insert_nft_deposit(&self, deposit: &NftDeposit) -> Result<(), LedgerError>;

    /// Up to `limit` Pending deposits not listed in `skip`, oldest first.
    async fn pending_nft_deposits(
        &self,
        skip: &[Uuid],
        limit: usize,
    ) -> Result<Vec<NftDeposit>, LedgerError>;

    /// Flip a Pending deposit to `status`. False if it was no longer Pending.
    async fn set_nft_deposit_status(
        &self,
        id: Uuid,
        status: TxStatus,
        error_message: &str,
    ) -> Result<bool, LedgerError>;

    /// Block of the most recent deposit of the token.
    async fn latest_deposit_block(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<BlockNumber>, LedgerError>;

    // ---- offers and trades ----

    /// Insert an offer row.
    async fn insert_offer(&self, offer: &Offer) -> Result<(), LedgerError>;

    /// Point the token's unlinked deposits at `offer_id`.
    async fn link_orphan_nft_deposits(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        offer_id: Uuid,
    ) -> Result<u64, LedgerError>;

    /// The Active offer of the token, newest first if several slipped in.
    async fn active_offer(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<Offer>, LedgerError>;

    /// Every Active offer.
    async fn active_offers(&self) -> Result<Vec<Offer>, LedgerError>;

    /// Move an Active offer to a terminal `status`. False if it was not Active.
    async fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> Result<bool, LedgerError>;

    /// Atomically flip the offer Active to Traded, insert the trade and
    /// enqueue the seller payout. False, with nothing written, if the offer
    /// was not Active.
    async fn settle_trade(
        &self,
        offer_id: Uuid,
        trade: &Trade,
        payout: &Payout,
    ) -> Result<bool, LedgerError>;

    // ---- quote deposits and payouts ----

    /// Enqueue a payout.
    async fn insert_payout(&self, payout: &Payout) -> Result<(), LedgerError>;

    /// Insert a quote deposit row.
    async fn insert_quote_deposit(&self, deposit: &QuoteDeposit) -> Result<(), LedgerError>;

    /// Up to `limit` Pending quote deposits in `quote_id` not listed in
    /// `skip`, oldest first.
    async fn pending_quote_deposits(
        &self,
        quote_id: QuoteId,
        skip: &[Uuid],
        limit: usize,
    ) -> Result<Vec<QuoteDeposit>, LedgerError>;

    /// Flip a Pending quote deposit to `status`. False if it was no longer Pending.
    async fn set_quote_deposit_status(
        &self,
        id: Uuid,
        status: TxStatus,
        error_message: &str,
    ) -> Result<bool, LedgerError>;
}
