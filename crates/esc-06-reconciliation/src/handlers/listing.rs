//! Listing placed on the matcher.

use esc_03_chain_gateway::ChainError;
use esc_05_ledger_store::{Offer, OfferStatus};
use shared_types::{AccountId, Balance, CollectionId, QuoteId, TokenId};
use tracing::{debug, info, warn};

use crate::application::ReconciliationEngine;
use crate::domain::ReconcileError;

impl ReconciliationEngine {
    /// Insert an Active offer and link the token's unlinked deposits to it.
    ///
    /// At most one offer per token is Active: a replayed identical listing is
    /// skipped, a different one cancels the stale offer first.
    pub(crate) async fn on_ask_placed(
        &self,
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: Balance,
    ) -> Result<(), ReconcileError> {
        let ledger = self.ledger();

        let existing = self
            .with_ledger("active_offer", || ledger.active_offer(collection_id, token_id))
            .await?;
        if let Some(stale) = existing {
            if stale.seller == seller && stale.price == price && stale.quote_id == quote_id {
                debug!(
                    collection_id,
                    token_id, "[esc-06] Listing of {}/{} already recorded", collection_id, token_id
                );
                return Ok(());
            }
            warn!(
                collection_id,
                token_id,
                "[esc-06] Replacing stale active offer {} for {}/{}",
                stale.id,
                collection_id,
                token_id
            );
            self.with_ledger("set_offer_status", || {
                ledger.set_offer_status(stale.id, OfferStatus::Canceled)
            })
            .await?;
        }

        let metadata = match self.gateway().token_metadata(collection_id, token_id).await {
            Ok(metadata) => metadata,
            Err(ChainError::Shutdown) => return Err(ReconcileError::Shutdown),
            Err(e) => {
                warn!(
                    "[esc-06] No metadata for {}/{}: {}",
                    collection_id, token_id, e
                );
                serde_json::Value::Null
            }
        };

        let offer = Offer::new(collection_id, token_id, quote_id, price, seller, metadata);
        self.with_ledger("insert_offer", || ledger.insert_offer(&offer))
            .await?;
        let linked = self
            .with_ledger("link_orphan_nft_deposits", || {
                ledger.link_orphan_nft_deposits(collection_id, token_id, offer.id)
            })
            .await?;

        info!(
            collection_id,
            token_id,
            "[esc-06] Offer {} for {}/{} at {} (quote {}), {} deposit(s) linked",
            offer.id,
            collection_id,
            token_id,
            price,
            quote_id,
            linked
        );
        Ok(())
    }
}
