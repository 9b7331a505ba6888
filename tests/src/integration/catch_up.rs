//! # Catch-Up Scenarios
//!
//! The watermark must stay contiguous whatever the head does, survive a
//! restart, and the run loop must follow new heads until stopped.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use esc_05_ledger_store::LedgerStore;
    use esc_06_reconciliation::test_utils::{BlockBuilder, TestHarness, ALICE};
    use esc_06_reconciliation::{EngineConfig, StartBlock};
    use proptest::prelude::*;

    fn assert_contiguous(blocks: &[u64]) {
        for pair in blocks.windows(2) {
            assert_eq!(pair[1], pair[0] + 1, "gap between {} and {}", pair[0], pair[1]);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_watermark_is_contiguous(heads in proptest::collection::vec(1u64..60, 1..6)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let harness = TestHarness::new();
                harness.engine.start().await.unwrap();
                for head in &heads {
                    harness.node.set_head(*head);
                    harness.engine.catch_up().await.unwrap();
                }
                harness.settle().await;

                let recorded = harness.ledger.processed_blocks();
                assert_contiguous(&recorded);
                let highest = heads.iter().copied().max().unwrap_or(0);
                assert_eq!(recorded.first().copied(), Some(1));
                assert_eq!(recorded.last().copied(), Some(highest));
            });
        }
    }

    #[tokio::test]
    async fn test_restart_resumes_after_watermark() {
        let first = TestHarness::new();
        first.node.set_head(10);
        first.engine.start().await.unwrap();
        first.engine.catch_up().await.unwrap();
        first.settle().await;

        // Same ledger, new engine, chain has moved on.
        let second = TestHarness::new();
        for block in first.ledger.processed_blocks() {
            second.ledger.record_processed_block(block).await.unwrap();
        }
        second.node.set_head(14);
        assert_eq!(second.engine.start().await.unwrap(), 11);
        assert_eq!(second.engine.catch_up().await.unwrap(), 4);
        second.settle().await;
        assert_eq!(
            second.ledger.processed_blocks(),
            (1..=14).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_current_start_skips_history() {
        let config = EngineConfig {
            start_block: StartBlock::Current,
            ..EngineConfig::for_testing()
        };
        let harness = TestHarness::with_config(config);
        harness
            .node
            .push_block(BlockBuilder::new(3).listing(ALICE, 3, 18, 2, 100).build());
        harness.node.set_head(20);

        assert_eq!(harness.engine.start().await.unwrap(), 20);
        harness.engine.catch_up().await.unwrap();
        harness.settle().await;
        assert_eq!(harness.ledger.processed_blocks(), vec![20]);
        assert!(harness.ledger.offers().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_outage_delays_but_does_not_skip() {
        let harness = TestHarness::new();
        harness.engine.start().await.unwrap();
        harness.node.set_head(4);
        harness.ledger.fail_next(3);

        harness.engine.catch_up().await.unwrap();
        harness.settle().await;
        assert_eq!(harness.ledger.processed_blocks(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_chain_disconnect_recovers() {
        let harness = TestHarness::new();
        harness
            .node
            .push_block(BlockBuilder::new(1).listing(ALICE, 3, 18, 2, 100).build());
        harness.engine.start().await.unwrap();
        harness.node.fail_next_reads(2);

        harness.engine.catch_up().await.unwrap();
        harness.settle().await;
        assert_eq!(harness.ledger.offers().len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_until_stop() {
        let harness = TestHarness::new();
        let engine = harness.engine.clone();
        let running = tokio::spawn(async move { engine.run().await });

        for number in 1..=3 {
            harness.node.push_block(BlockBuilder::new(number).build());
        }
        let ledger = Arc::clone(&harness.ledger);
        tokio::time::timeout(Duration::from_secs(5), async move {
            while ledger.processed_blocks().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(harness.stop.trigger());
        running.await.unwrap().unwrap();
        assert_eq!(harness.ledger.processed_blocks(), vec![1, 2, 3]);
        assert_eq!(harness.engine.scheduler().in_flight(), 0);
    }
}
