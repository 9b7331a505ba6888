//! # Stuck-Token Recovery
//!
//! An offer is stuck when the ledger still shows it Active but the matcher
//! no longer holds an ask for its token: the purchase or cancel settled on
//! chain while its block was lost (recorded, then the process died). The
//! pass rescans blocks from the earliest deposit of the stuck tokens up to
//! the watermark and replays only purchase and cancel settlements for them.

use std::collections::HashSet;
use std::fmt;

use esc_04_extrinsic_classifier::{classify_block, EscrowAction};
use esc_05_ledger_store::Offer;
use shared_types::{BlockNumber, CollectionId, TokenId};
use tracing::{info, warn};

use crate::application::ReconciliationEngine;
use crate::config::RecoveryMode;
use crate::domain::ReconcileError;

/// Outcome of a recovery pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Active offers without a matcher ask.
    pub stuck_offers: usize,
    /// Blocks rescanned.
    pub scanned_blocks: u64,
    /// Settlements found for stuck tokens.
    pub settlements_found: usize,
    /// Settlements applied (zero in dry-run).
    pub settlements_applied: usize,
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stuck offer(s), {} block(s) scanned, {} settlement(s) found, {} applied",
            self.stuck_offers, self.scanned_blocks, self.settlements_found, self.settlements_applied
        )
    }
}

/// Operator-triggered replay of missed settlements.
pub struct StuckTokenRecovery {
    engine: ReconciliationEngine,
}

impl StuckTokenRecovery {
    /// Recovery over `engine`'s collaborators.
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }

    /// Active offers whose token has no ask on the matcher.
    pub async fn find_stuck(&self) -> Result<Vec<Offer>, ReconcileError> {
        let engine = &self.engine;
        let offers = engine
            .with_ledger("active_offers", || engine.ledger().active_offers())
            .await?;
        let matcher = engine.classifier().matcher;

        let mut stuck = Vec::new();
        for offer in offers {
            let ask = engine
                .gateway()
                .ask_for_token(&matcher, offer.collection_id, offer.token_id)
                .await?;
            if ask.is_none() {
                warn!(
                    collection_id = offer.collection_id,
                    token_id = offer.token_id,
                    "[esc-06] Offer {} is active but the matcher has no ask",
                    offer.id
                );
                stuck.push(offer);
            }
        }
        Ok(stuck)
    }

    /// Run one pass. `Off` does nothing; `DryRun` only logs.
    pub async fn run(&self, mode: RecoveryMode) -> Result<RecoveryReport, ReconcileError> {
        let mut report = RecoveryReport::default();
        if mode == RecoveryMode::Off {
            return Ok(report);
        }

        let stuck = self.find_stuck().await?;
        report.stuck_offers = stuck.len();
        if stuck.is_empty() {
            info!("[esc-06] No stuck tokens");
            return Ok(report);
        }

        let engine = &self.engine;
        let tokens: HashSet<(CollectionId, TokenId)> = stuck
            .iter()
            .map(|offer| (offer.collection_id, offer.token_id))
            .collect();

        let Some(from) = self.earliest_deposit_block(&tokens).await? else {
            warn!("[esc-06] Stuck tokens have no deposit rows, nothing to rescan");
            return Ok(report);
        };
        let to = engine
            .with_ledger("last_processed_block", || {
                engine.ledger().last_processed_block()
            })
            .await?
            .unwrap_or(0);

        info!(
            "[esc-06] Rescanning blocks {}..={} for {} stuck token(s) ({:?})",
            from,
            to,
            tokens.len(),
            mode
        );

        for block in from..=to {
            if engine.stop_signal().is_stopped() {
                return Err(ReconcileError::Shutdown);
            }
            let view = engine.gateway().read_block(block).await?;
            report.scanned_blocks += 1;

            for classified in classify_block(&view, engine.classifier()) {
                let Ok(action) = classified.result else {
                    continue;
                };
                if !is_settlement_for(&action, &tokens) {
                    continue;
                }
                report.settlements_found += 1;

                if mode == RecoveryMode::DryRun {
                    info!(block, "[esc-06] Would apply {} from block {}", action, block);
                    continue;
                }
                match engine.apply(&action, block).await {
                    Ok(()) => {
                        report.settlements_applied += 1;
                        info!(block, "[esc-06] Recovered {} from block {}", action, block);
                    }
                    Err(ReconcileError::Shutdown) => return Err(ReconcileError::Shutdown),
                    Err(e) => warn!(block, "[esc-06] Could not recover {}: {}", action, e),
                }
            }
        }

        Ok(report)
    }

    async fn earliest_deposit_block(
        &self,
        tokens: &HashSet<(CollectionId, TokenId)>,
    ) -> Result<Option<BlockNumber>, ReconcileError> {
        let engine = &self.engine;
        let mut earliest: Option<BlockNumber> = None;
        for &(collection_id, token_id) in tokens {
            let block = engine
                .with_ledger("latest_deposit_block", || {
                    engine.ledger().latest_deposit_block(collection_id, token_id)
                })
                .await?;
            if let Some(block) = block {
                earliest = Some(earliest.map_or(block, |current| current.min(block)));
            }
        }
        Ok(earliest)
    }
}

fn is_settlement_for(action: &EscrowAction, tokens: &HashSet<(CollectionId, TokenId)>) -> bool {
    matches!(
        action,
        EscrowAction::Purchased { .. } | EscrowAction::Cancelled { .. }
    ) && action.token().is_some_and(|token| tokens.contains(&token))
}
