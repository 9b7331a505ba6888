//! Token deposited to the escrow admin.

use esc_05_ledger_store::NftDeposit;
use shared_types::{AccountId, BlockNumber, CollectionId, TokenId};
use tracing::info;

use crate::application::ReconciliationEngine;
use crate::domain::ReconcileError;

/// Error text on deposit rows replaced by a newer deposit of the same token.
pub const SUPERSEDED_DEPOSIT: &str = "Failed to register (sync err)";

impl ReconciliationEngine {
    /// Only the latest deposit of a token is authoritative: earlier Pending
    /// rows are failed, unlinked rows are deleted, then a Pending row is
    /// inserted. Replaying the same deposit leaves the same single row shape.
    pub(crate) async fn on_nft_deposited(
        &self,
        sender: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        block: BlockNumber,
    ) -> Result<(), ReconcileError> {
        let ledger = self.ledger();

        let failed = self
            .with_ledger("fail_pending_nft_deposits", || {
                ledger.fail_pending_nft_deposits(collection_id, token_id, SUPERSEDED_DEPOSIT)
            })
            .await?;
        let deleted = self
            .with_ledger("delete_orphan_nft_deposits", || {
                ledger.delete_orphan_nft_deposits(collection_id, token_id)
            })
            .await?;

        let deposit = NftDeposit::new(collection_id, token_id, &sender, block);
        self.with_ledger("insert_nft_deposit", || ledger.insert_nft_deposit(&deposit))
            .await?;

        info!(
            block,
            collection_id,
            token_id,
            "[esc-06] Deposit of {}/{} by {} queued ({} superseded, {} removed)",
            collection_id,
            token_id,
            sender,
            failed,
            deleted
        );
        Ok(())
    }
}
