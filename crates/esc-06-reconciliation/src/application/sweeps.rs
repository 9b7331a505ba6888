//! # Deposit Sweeps
//!
//! Register queued deposits with the matcher. A sweep pages through the
//! Pending rows, skipping every row it already visited, until a page comes
//! back empty. It admits one unit per row it can claim; a row stays claimed
//! until its unit exits, so overlapping sweeps never register it twice.
//! Success flips the row to Registered, a malformed key flips it to Failed,
//! anything else leaves it Pending for a later sweep.

use esc_05_ledger_store::{NftDeposit, QuoteDeposit, TxStatus};
use shared_types::{AccountId, ChainCall};
use tracing::{info, warn};

use crate::application::ReconciliationEngine;
use crate::domain::{DepositClaim, ReconcileError};

/// Status text written on successful registration.
pub const REGISTERED_OK: &str = "OK";

impl ReconciliationEngine {
    /// Admit a registration unit for every claimable Pending NFT deposit.
    /// Returns the number of units admitted.
    pub async fn sweep_nft_deposits(&self) -> Result<usize, ReconcileError> {
        let batch = self.config().sweep_batch;
        let mut visited = Vec::new();
        let mut admitted = 0;
        loop {
            let rows = self
                .with_ledger("pending_nft_deposits", || {
                    self.ledger().pending_nft_deposits(&visited, batch)
                })
                .await?;
            if rows.is_empty() {
                return Ok(admitted);
            }

            for row in rows {
                visited.push(row.id);
                let Some(claim) = self.state().claim(row.id) else {
                    continue;
                };
                let engine = self.clone();
                self.scheduler()
                    .submit(async move {
                        let id = row.id;
                        if let Err(e) = engine.register_nft_deposit(row, claim).await {
                            warn!("[esc-06] NFT deposit {} not registered: {}", id, e);
                        }
                    })
                    .await?;
                admitted += 1;
            }
        }
    }

    /// Admit a registration unit for every claimable Pending quote deposit in
    /// the configured quote currency. Returns the number of units admitted.
    pub async fn sweep_quote_deposits(&self) -> Result<usize, ReconcileError> {
        let batch = self.config().sweep_batch;
        let quote_id = self.config().quote_id;
        let mut visited = Vec::new();
        let mut admitted = 0;
        loop {
            let rows = self
                .with_ledger("pending_quote_deposits", || {
                    self.ledger().pending_quote_deposits(quote_id, &visited, batch)
                })
                .await?;
            if rows.is_empty() {
                return Ok(admitted);
            }

            for row in rows {
                visited.push(row.id);
                let Some(claim) = self.state().claim(row.id) else {
                    continue;
                };
                let engine = self.clone();
                self.scheduler()
                    .submit(async move {
                        let id = row.id;
                        if let Err(e) = engine.register_quote_deposit(row, claim).await {
                            warn!("[esc-06] Quote deposit {} not registered: {}", id, e);
                        }
                    })
                    .await?;
                admitted += 1;
            }
        }
    }

    async fn register_nft_deposit(
        &self,
        row: NftDeposit,
        _claim: DepositClaim,
    ) -> Result<(), ReconcileError> {
        let owner = match AccountId::from_base64(&row.owner_public_key) {
            Ok(owner) => owner,
            Err(e) => {
                let reason = e.to_string();
                self.with_ledger("set_nft_deposit_status", || {
                    self.ledger()
                        .set_nft_deposit_status(row.id, TxStatus::Failed, &reason)
                })
                .await?;
                return Err(e.into());
            }
        };

        let call = ChainCall::RegisterNftDeposit {
            matcher: self.classifier().matcher,
            collection_id: row.collection_id,
            token_id: row.token_id,
            owner,
        };
        if let Err(e) = self.submit_signed(call).await {
            self.backoff_after_failed_registration(&e).await?;
            return Err(e);
        }

        self.with_ledger("set_nft_deposit_status", || {
            self.ledger()
                .set_nft_deposit_status(row.id, TxStatus::Registered, REGISTERED_OK)
        })
        .await?;
        info!(
            collection_id = row.collection_id,
            token_id = row.token_id,
            "[esc-06] NFT deposit {}/{} registered for {}",
            row.collection_id,
            row.token_id,
            owner
        );
        Ok(())
    }

    async fn register_quote_deposit(
        &self,
        row: QuoteDeposit,
        _claim: DepositClaim,
    ) -> Result<(), ReconcileError> {
        let depositor = match AccountId::from_hex(&row.account_public_key) {
            Ok(depositor) => depositor,
            Err(e) => {
                let reason = e.to_string();
                self.with_ledger("set_quote_deposit_status", || {
                    self.ledger()
                        .set_quote_deposit_status(row.id, TxStatus::Failed, &reason)
                })
                .await?;
                return Err(e.into());
            }
        };

        let matcher = self.classifier().matcher;
        let mut calls = Vec::with_capacity(2);
        if self.config().whitelist {
            calls.push(ChainCall::AddToWhitelist {
                matcher,
                account: depositor,
            });
        }
        calls.push(ChainCall::RegisterQuoteDeposit {
            matcher,
            quote_id: row.quote_id,
            amount: row.amount,
            depositor,
        });

        for call in calls {
            if let Err(e) = self.submit_signed(call).await {
                self.backoff_after_failed_registration(&e).await?;
                return Err(e);
            }
        }

        self.with_ledger("set_quote_deposit_status", || {
            self.ledger()
                .set_quote_deposit_status(row.id, TxStatus::Registered, REGISTERED_OK)
        })
        .await?;
        info!(
            quote_id = row.quote_id,
            "[esc-06] Quote deposit of {} registered for {}",
            row.amount,
            depositor
        );
        Ok(())
    }

    /// Hold the claim a while so the next sweep does not hammer a failing row.
    /// Fails with `Shutdown` if the stop signal fires during the wait.
    async fn backoff_after_failed_registration(
        &self,
        error: &ReconcileError,
    ) -> Result<(), ReconcileError> {
        if matches!(error, ReconcileError::Shutdown) {
            return Ok(());
        }
        self.pause(self.config().registration_retry()).await
    }
}
