//! # Reconciliation Engine
//!
//! The catch-up loop. Per block:
//!
//! ```text
//! Unprocessed → Fetching → Classifying → Applying → Recorded
//! ```
//!
//! The watermark row is written by the loop, in block order, before the
//! block's unit is admitted to the scheduler. A block whose row already exists
//! is never fetched again, so a crash mid-block costs that block's remaining
//! effects rather than stalling the loop. Handler failures are logged and the
//! block still counts as done.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use esc_01_key_pool::KeyPool;
use esc_02_task_scheduler::{StopSignal, TaskScheduler};
use esc_03_chain_gateway::{ChainError, ChainGateway};
use esc_04_extrinsic_classifier::{classify_block, ClassifierContext, Classified};
use esc_05_ledger_store::{LedgerError, LedgerStore};
use shared_types::{BlockNumber, ChainCall};
use tracing::{debug, error, info, warn};

use crate::application::recovery::StuckTokenRecovery;
use crate::config::{EngineConfig, RecoveryMode, StartBlock};
use crate::domain::{EngineState, ReconcileError};

struct Inner {
    gateway: Arc<ChainGateway>,
    ledger: Arc<dyn LedgerStore>,
    keys: KeyPool,
    scheduler: TaskScheduler,
    classifier: ClassifierContext,
    config: EngineConfig,
    state: Arc<EngineState>,
}

/// Block ingestion and reconciliation engine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ReconciliationEngine {
    inner: Arc<Inner>,
}

impl ReconciliationEngine {
    /// Engine over the given collaborators. The scheduler's stop signal is the
    /// engine's stop signal.
    pub fn new(
        gateway: Arc<ChainGateway>,
        ledger: Arc<dyn LedgerStore>,
        keys: KeyPool,
        scheduler: TaskScheduler,
        classifier: ClassifierContext,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                ledger,
                keys,
                scheduler,
                classifier,
                config,
                state: Arc::new(EngineState::new()),
            }),
        }
    }

    /// Chain gateway.
    pub fn gateway(&self) -> &Arc<ChainGateway> {
        &self.inner.gateway
    }

    /// Ledger store.
    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.inner.ledger
    }

    /// Signing key pool.
    pub fn keys(&self) -> &KeyPool {
        &self.inner.keys
    }

    /// Task scheduler.
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.inner.scheduler
    }

    /// Escrow and matcher addresses.
    pub fn classifier(&self) -> &ClassifierContext {
        &self.inner.classifier
    }

    /// Configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<EngineState> {
        &self.inner.state
    }

    /// Process stop signal.
    pub fn stop_signal(&self) -> &StopSignal {
        self.inner.scheduler.stop_signal()
    }

    /// Connect, subscribe to heads and position the cursor.
    ///
    /// Catch-up resumes after the highest recorded block, or at the
    /// configured start block on an empty watermark table.
    pub async fn start(&self) -> Result<BlockNumber, ReconcileError> {
        self.gateway().connect().await?;

        let state = Arc::clone(self.state());
        self.gateway()
            .subscribe_new_heads(move |head| state.observe_head(head))
            .await?;

        let head = self.gateway().chain_head().await?;
        self.state().observe_head(head);

        let last = self
            .with_ledger("last_processed_block", || self.ledger().last_processed_block())
            .await?;
        let next = match (last, self.config().start_block) {
            (Some(last), _) => last + 1,
            (None, StartBlock::Current) => head,
            (None, StartBlock::Number(n)) => n,
        };
        self.state().set_next_block(next);

        info!(
            head,
            next,
            "[esc-06] Engine started, catching up from block {} (head {})",
            next,
            head
        );
        Ok(next)
    }

    /// Run until the stop signal fires, then drain in-flight units.
    pub async fn run(&self) -> Result<(), ReconcileError> {
        match self.start().await {
            Ok(_) => {}
            Err(ReconcileError::Chain(ChainError::Shutdown)) | Err(ReconcileError::Shutdown) => {
                return Ok(())
            }
            Err(e) => return Err(e),
        }

        let recovery = self.config().recovery;
        if recovery != RecoveryMode::Off {
            match StuckTokenRecovery::new(self.clone()).run(recovery).await {
                Ok(report) => info!("[esc-06] Stuck-token recovery finished: {}", report),
                Err(e) => error!("[esc-06] Stuck-token recovery aborted: {}", e),
            }
        }

        let stop = self.stop_signal().clone();
        while !stop.is_stopped() {
            if let Err(e) = self.tick().await {
                if stops_loop(&e) {
                    break;
                }
                warn!("[esc-06] Loop iteration failed: {}", e);
            }

            tokio::select! {
                _ = stop.stopped() => break,
                _ = self.state().woken() => {}
                _ = tokio::time::sleep(self.config().poll_interval()) => {}
            }
        }

        self.scheduler().drain().await;
        info!("[esc-06] Engine stopped at block {}", self.state().next_block());
        Ok(())
    }

    /// One loop iteration: catch up to the head, then sweep queued deposits.
    pub async fn tick(&self) -> Result<(), ReconcileError> {
        let blocks = self.catch_up().await?;
        let nfts = self.sweep_nft_deposits().await?;
        let quotes = self.sweep_quote_deposits().await?;
        if blocks + nfts + quotes > 0 {
            debug!(
                "[esc-06] Admitted {} block(s), {} NFT and {} quote registration(s)",
                blocks, nfts, quotes
            );
        }
        Ok(())
    }

    /// Record and admit every block from the cursor up to the best head.
    /// Each block takes a scheduler slot before its watermark row is
    /// written, so a stop while waiting for a slot leaves it unrecorded.
    ///
    /// Returns the number of blocks admitted.
    pub async fn catch_up(&self) -> Result<usize, ReconcileError> {
        let mut admitted = 0;
        loop {
            let next = self.state().next_block();
            if next > self.state().best_block() {
                break;
            }
            if self.stop_signal().is_stopped() {
                return Err(ReconcileError::Shutdown);
            }

            // The slot comes first: a block is recorded only once its unit
            // is certain to be spawned.
            let slot = self.scheduler().reserve().await?;
            let fresh = self
                .with_ledger("record_processed_block", || {
                    self.ledger().record_processed_block(next)
                })
                .await?;
            self.state().set_next_block(next + 1);
            if !fresh {
                debug!(block = next, "[esc-06] Block {} already recorded, skipping", next);
                continue;
            }

            let engine = self.clone();
            slot.spawn(async move {
                if let Err(e) = engine.apply_block(next).await {
                    warn!(block = next, "[esc-06] Block {} left partially applied: {}", next, e);
                }
            });
            admitted += 1;
        }
        Ok(admitted)
    }

    /// Record `block` and apply it in the calling task.
    ///
    /// Returns false, without fetching, if the block was already recorded.
    pub async fn process_block(&self, block: BlockNumber) -> Result<bool, ReconcileError> {
        let fresh = self
            .with_ledger("record_processed_block", || {
                self.ledger().record_processed_block(block)
            })
            .await?;
        if !fresh {
            return Ok(false);
        }
        self.apply_block(block).await?;
        Ok(true)
    }

    /// Fetch, classify and apply one block. Returns the number of actions
    /// applied; dropped actions are logged.
    pub(crate) async fn apply_block(&self, block: BlockNumber) -> Result<usize, ReconcileError> {
        let view = self.gateway().read_block(block).await?;
        let mut applied = 0;

        for Classified { index, result } in classify_block(&view, self.classifier()) {
            let action = match result {
                Ok(action) => action,
                Err(e) => {
                    warn!(
                        block,
                        index, "[esc-06] Dropping extrinsic {}/{}: {}", block, index, e
                    );
                    continue;
                }
            };

            match self.apply(&action, block).await {
                Ok(()) => applied += 1,
                Err(ReconcileError::Shutdown) => return Err(ReconcileError::Shutdown),
                Err(e) if e.is_conflict() => {
                    warn!(block, index, "[esc-06] Dropping {}: {}", action, e);
                }
                Err(e) => {
                    error!(block, index, "[esc-06] Failed to apply {}: {}", action, e);
                }
            }
        }

        if applied > 0 {
            debug!(block, "[esc-06] Applied {} action(s) from block {}", applied, block);
        }
        Ok(applied)
    }

    /// Trigger the stop signal once and wait for in-flight units.
    pub async fn shutdown(&self) {
        if self.stop_signal().trigger() {
            info!("[esc-06] Shutdown requested, draining {} unit(s)", self.scheduler().in_flight());
        }
        self.scheduler().drain().await;
    }

    /// Run a ledger operation, retrying transient failures with a fixed delay.
    pub(crate) async fn with_ledger<T, F, Fut>(
        &self,
        what: &str,
        op: F,
    ) -> Result<T, ReconcileError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    warn!("[esc-06] Ledger {} failed: {}; retrying", what, e);
                    self.pause(self.config().retry_delay()).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Sleep unless the stop signal fires first.
    pub(crate) async fn pause(&self, delay: Duration) -> Result<(), ReconcileError> {
        tokio::select! {
            _ = self.stop_signal().stopped() => Err(ReconcileError::Shutdown),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Lease a key for `call`'s group, submit it, and require success.
    pub(crate) async fn submit_signed(&self, call: ChainCall) -> Result<(), ReconcileError> {
        let gateway = self.gateway();
        let label = call.to_string();
        let outcome = self
            .keys()
            .lease(call.auth_group(), move |lease| async move {
                gateway.submit_call(&lease, &call).await
            })
            .await?;

        if outcome.is_success() {
            Ok(())
        } else {
            Err(ReconcileError::CallFailed(label))
        }
    }
}

fn stops_loop(error: &ReconcileError) -> bool {
    matches!(
        error,
        ReconcileError::Shutdown
            | ReconcileError::Scheduler(_)
            | ReconcileError::Chain(ChainError::Shutdown)
    )
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("next_block", &self.state().next_block())
            .field("best_block", &self.state().best_block())
            .field("in_flight", &self.scheduler().in_flight())
            .finish()
    }
}
