//! # Action Handlers
//!
//! One handler per escrow action. Each runs its ledger writes in order and,
//! where the action moves a token, leases a key and submits the transfer.
//!
//! | Action | Ledger | Chain |
//! |--------|--------|-------|
//! | deposit | fail Pending rows, drop orphans, insert Pending row | - |
//! | listing | insert Active offer, link orphan deposits | metadata read |
//! | purchase | offer → Traded, trade, Matched payout | transfer to buyer |
//! | cancel | offer → Canceled | transfer to seller |
//! | withdraw | Unused payout | - |

mod deposit;
mod listing;
mod settlement;
mod withdraw;

use esc_04_extrinsic_classifier::EscrowAction;
use shared_types::BlockNumber;

use crate::application::ReconciliationEngine;
use crate::domain::ReconcileError;

pub use deposit::SUPERSEDED_DEPOSIT;

impl ReconciliationEngine {
    /// Apply one classified action seen in `block`.
    pub async fn apply(
        &self,
        action: &EscrowAction,
        block: BlockNumber,
    ) -> Result<(), ReconcileError> {
        match action {
            EscrowAction::NftDeposited {
                sender,
                collection_id,
                token_id,
            } => {
                self.on_nft_deposited(*sender, *collection_id, *token_id, block)
                    .await
            }
            EscrowAction::AskPlaced {
                seller,
                collection_id,
                token_id,
                quote_id,
                price,
            } => {
                self.on_ask_placed(*seller, *collection_id, *token_id, *quote_id, *price)
                    .await
            }
            EscrowAction::Purchased {
                buyer,
                seller,
                collection_id,
                token_id,
                quote_id,
                price,
            } => {
                self.on_purchased(*buyer, *seller, *collection_id, *token_id, *quote_id, *price)
                    .await
            }
            EscrowAction::Cancelled {
                seller,
                collection_id,
                token_id,
            } => self.on_cancelled(*seller, *collection_id, *token_id).await,
            EscrowAction::QuoteWithdrawn {
                withdrawer,
                quote_id,
                amount,
            } => {
                self.on_quote_withdrawn(*withdrawer, *quote_id, *amount)
                    .await
            }
        }
    }
}
