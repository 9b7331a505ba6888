//! Purchase and cancel settlements. Both end with the escrowed token leaving
//! the escrow account, signed by a key of the token's collection.

use esc_05_ledger_store::{Offer, OfferStatus, Payout, Trade, WithdrawType};
use shared_types::{AccountId, Balance, ChainCall, CollectionId, QuoteId, TokenId};
use tracing::{info, warn};

use crate::application::ReconciliationEngine;
use crate::domain::ReconcileError;

impl ReconciliationEngine {
    /// Offer → Traded with its trade and seller payout, then the token goes
    /// to the buyer.
    pub(crate) async fn on_purchased(
        &self,
        buyer: AccountId,
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: Balance,
    ) -> Result<(), ReconcileError> {
        let offer = self.require_active_offer(collection_id, token_id).await?;
        if offer.price != price {
            warn!(
                collection_id,
                token_id,
                "[esc-06] Purchase price {} differs from offer price {}",
                price,
                offer.price
            );
        }

        let trade = Trade::new(offer.id, buyer);
        let payout = Payout::new(&seller, quote_id, price, WithdrawType::Matched);
        let settled = self
            .with_ledger("settle_trade", || {
                self.ledger().settle_trade(offer.id, &trade, &payout)
            })
            .await?;
        if !settled {
            return Err(ReconcileError::AlreadySettled {
                collection_id,
                token_id,
            });
        }
        info!(
            collection_id,
            token_id,
            "[esc-06] Offer {} traded to {} for {}",
            offer.id,
            buyer,
            price
        );

        self.transfer_token(buyer, collection_id, token_id).await
    }

    /// Offer → Canceled, then the token goes back to the seller.
    pub(crate) async fn on_cancelled(
        &self,
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<(), ReconcileError> {
        let offer = self.require_active_offer(collection_id, token_id).await?;
        if offer.seller != seller {
            warn!(
                collection_id,
                token_id,
                "[esc-06] Cancel released to {} but offer seller is {}",
                seller,
                offer.seller
            );
        }

        let cancelled = self
            .with_ledger("set_offer_status", || {
                self.ledger().set_offer_status(offer.id, OfferStatus::Canceled)
            })
            .await?;
        if !cancelled {
            return Err(ReconcileError::AlreadySettled {
                collection_id,
                token_id,
            });
        }
        info!(
            collection_id,
            token_id,
            "[esc-06] Offer {} cancelled",
            offer.id
        );

        self.transfer_token(seller, collection_id, token_id).await
    }

    async fn require_active_offer(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Offer, ReconcileError> {
        self.with_ledger("active_offer", || {
            self.ledger().active_offer(collection_id, token_id)
        })
        .await?
        .ok_or(ReconcileError::NoActiveOffer {
            collection_id,
            token_id,
        })
    }

    async fn transfer_token(
        &self,
        recipient: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<(), ReconcileError> {
        self.submit_signed(ChainCall::nft_transfer(recipient, collection_id, token_id))
            .await?;
        info!(
            collection_id,
            token_id,
            "[esc-06] Token {}/{} sent to {}",
            collection_id,
            token_id,
            recipient
        );
        Ok(())
    }
}
