//! Unused quote balance withdrawn.

use esc_05_ledger_store::{Payout, WithdrawType};
use shared_types::{AccountId, Balance, QuoteId};
use tracing::info;

use crate::application::ReconciliationEngine;
use crate::domain::ReconcileError;

impl ReconciliationEngine {
    /// Enqueue the payout; delivery belongs to the payout service.
    pub(crate) async fn on_quote_withdrawn(
        &self,
        withdrawer: AccountId,
        quote_id: QuoteId,
        amount: Balance,
    ) -> Result<(), ReconcileError> {
        let payout = Payout::new(&withdrawer, quote_id, amount, WithdrawType::Unused);
        self.with_ledger("insert_payout", || self.ledger().insert_payout(&payout))
            .await?;
        info!(
            quote_id,
            "[esc-06] Withdrawal of {} (quote {}) by {} enqueued",
            amount,
            quote_id,
            withdrawer
        );
        Ok(())
    }
}
