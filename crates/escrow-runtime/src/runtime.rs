//! # Escrow Runtime
//!
//! Wires the subsystems around one stop signal:
//!
//! ```text
//! AdminKeys ──→ KeyPool ─────────────┐
//! ChainNode ──→ ChainGateway ────────┤
//! LedgerStore ───────────────────────┼──→ ReconciliationEngine
//! TaskScheduler(MAX_CONCURRENCY) ────┤
//! ClassifierContext(admin, matcher) ─┘
//! ```
//!
//! The gateway watchdog runs beside the engine and is aborted once the
//! engine has drained.

use std::sync::Arc;

use anyhow::Context;
use esc_02_task_scheduler::{StopSignal, TaskScheduler};
use esc_03_chain_gateway::{ChainGateway, ChainNode, HttpChainNode};
use esc_04_extrinsic_classifier::ClassifierContext;
use esc_05_ledger_store::{LedgerStore, PgLedger};
use esc_06_reconciliation::ReconciliationEngine;
use tracing::info;

use crate::config::EscrowConfig;
use crate::keys::AdminKeys;

/// The wired escrow.
#[derive(Clone)]
pub struct EscrowRuntime {
    engine: ReconciliationEngine,
    stop: StopSignal,
}

impl EscrowRuntime {
    /// Connect to the configured chain node and database.
    pub async fn connect(config: &EscrowConfig) -> anyhow::Result<Self> {
        let node = HttpChainNode::new(&config.chain).context("chain node client")?;
        let ledger = PgLedger::connect(&config.ledger)
            .await
            .with_context(|| format!("ledger at {}", config.ledger.display_target()))?;
        Self::with_collaborators(config, Arc::new(node), Arc::new(ledger))
    }

    /// Wire the engine over the given chain node and ledger.
    pub fn with_collaborators(
        config: &EscrowConfig,
        node: Arc<dyn ChainNode>,
        ledger: Arc<dyn LedgerStore>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let keys = AdminKeys::from_config(config)?;
        let classifier = ClassifierContext::new(keys.escrow_admin(), config.matcher()?);

        let stop = StopSignal::new();
        let gateway = Arc::new(
            ChainGateway::new(node, config.chain.clone()).with_shutdown(stop.token().clone()),
        );
        let scheduler = TaskScheduler::new(config.max_concurrency, stop.clone());
        let engine = ReconciliationEngine::new(
            gateway,
            ledger,
            keys.into_pool(),
            scheduler,
            classifier,
            config.engine.clone(),
        );
        Ok(Self { engine, stop })
    }

    /// The engine.
    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Run until [`stop`](Self::stop) is called and in-flight work drains.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "[esc-06] Escrow admin {}, matcher {}",
            self.engine.classifier().escrow_admin,
            self.engine.classifier().matcher
        );
        let watchdog = self.engine.gateway().spawn_watchdog();
        let result = self.engine.run().await;
        watchdog.abort();
        result.context("reconciliation engine")
    }

    /// Request shutdown. Returns false if it was already requested.
    pub fn stop(&self) -> bool {
        self.stop.trigger()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esc_03_chain_gateway::InMemoryChainNode;
    use esc_05_ledger_store::InMemoryLedger;
    use shared_types::BlockView;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runtime_runs_and_stops() {
        let node = Arc::new(InMemoryChainNode::new());
        let ledger = Arc::new(InMemoryLedger::new());
        node.push_block(BlockView {
            number: 3,
            ..BlockView::default()
        });

        let runtime = EscrowRuntime::with_collaborators(
            &EscrowConfig::for_testing(),
            Arc::clone(&node) as Arc<dyn ChainNode>,
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
        )
        .unwrap();
        let worker = {
            let runtime = runtime.clone();
            tokio::spawn(async move { runtime.run().await })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while ledger.processed_blocks() != vec![1, 2, 3] {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(runtime.stop());
        assert!(!runtime.stop());
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_invalid_config_refused() {
        let config = EscrowConfig {
            max_concurrency: 0,
            ..EscrowConfig::for_testing()
        };
        let result = EscrowRuntime::with_collaborators(
            &config,
            Arc::new(InMemoryChainNode::new()),
            Arc::new(InMemoryLedger::new()),
        );
        assert!(result.is_err());
    }
}
