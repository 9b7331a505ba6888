//! # Settlement Scenarios
//!
//! Blocks built with escrow extrinsics go through the full engine path:
//! gateway read, classification, handler, ledger and the outgoing transfer.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use esc_01_key_pool::{AdminIdentity, KeyPool, SecretSeed};
    use esc_05_ledger_store::{LedgerStore, OfferStatus, TxStatus, WithdrawType};
    use esc_06_reconciliation::test_utils::{escrow_admin, BlockBuilder, TestHarness, ALICE, BOB};
    use esc_06_reconciliation::EngineConfig;
    use shared_types::{AccountId, Balance, ChainCall};

    async fn started() -> TestHarness {
        let harness = TestHarness::new();
        harness.engine.start().await.unwrap();
        harness
    }

    /// Feed blocks one at a time so their units settle in chain order.
    async fn run_blocks(harness: &TestHarness, blocks: Vec<shared_types::BlockView>) {
        for block in blocks {
            let number = block.number;
            harness.node.push_block(block);
            harness.engine.catch_up().await.unwrap();
            harness.settle().await;
            assert_eq!(
                harness.ledger.last_processed_block().await.unwrap(),
                Some(number)
            );
        }
    }

    #[tokio::test]
    async fn test_listing_then_purchase() {
        let harness = started().await;

        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(1).deposit(ALICE, 3, 18).build(),
                BlockBuilder::new(2).listing(ALICE, 3, 18, 2, 100).build(),
            ],
        )
        .await;

        let offers = harness.ledger.offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].status.code(), 1);
        assert_eq!(offers[0].collection_id, 3);
        assert_eq!(offers[0].token_id, 18);
        assert_eq!(offers[0].price, Balance::from(100u64));
        assert_eq!(offers[0].seller, ALICE);

        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(3).build(),
                BlockBuilder::new(4).build(),
                BlockBuilder::new(5)
                    .purchase(BOB, ALICE, 3, 18, 2, 100)
                    .build(),
            ],
        )
        .await;

        let offer = &harness.ledger.offers()[0];
        assert_eq!(offer.status.code(), 3);

        let trades = harness.ledger.trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].offer_id, offer.id);

        let payouts = harness.ledger.payouts();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].withdraw_type.code(), 1);

        let transfers: Vec<_> = harness
            .node
            .submitted()
            .into_iter()
            .filter(|submitted| matches!(submitted.call, ChainCall::NftTransfer { .. }))
            .collect();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].call, ChainCall::nft_transfer(BOB, 3, 18));
    }

    #[tokio::test]
    async fn test_listing_then_cancel() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(1).listing(ALICE, 3, 18, 2, 100).build(),
                BlockBuilder::new(2).cancel(ALICE, 3, 18).build(),
            ],
        )
        .await;

        assert_eq!(harness.ledger.offers()[0].status.code(), 2);
        assert!(harness.ledger.trades().is_empty());
        let submitted = harness.node.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].call, ChainCall::nft_transfer(ALICE, 3, 18));
    }

    #[tokio::test]
    async fn test_purchase_without_offer_changes_nothing() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![BlockBuilder::new(1)
                .purchase(BOB, ALICE, 3, 18, 2, 100)
                .build()],
        )
        .await;

        assert!(harness.ledger.offers().is_empty());
        assert!(harness.ledger.trades().is_empty());
        assert!(harness.ledger.payouts().is_empty());
        assert!(harness.node.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_does_not_touch_other_offers() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(1).listing(ALICE, 3, 19, 2, 100).build(),
                BlockBuilder::new(2)
                    .purchase(BOB, ALICE, 3, 18, 2, 100)
                    .build(),
            ],
        )
        .await;

        assert_eq!(harness.ledger.offers()[0].status, OfferStatus::Active);
        assert!(harness.ledger.trades().is_empty());
    }

    #[tokio::test]
    async fn test_failed_listing_is_ignored() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![BlockBuilder::new(1)
                .failed_listing(ALICE, 3, 18, 2, 100)
                .build()],
        )
        .await;
        assert!(harness.ledger.offers().is_empty());
    }

    #[tokio::test]
    async fn test_missing_settlement_events_drop_only_that_action() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(1).listing(ALICE, 3, 18, 2, 100).build(),
                BlockBuilder::new(2)
                    .purchase_without_events(BOB)
                    .withdraw(BOB, 2, 50)
                    .build(),
            ],
        )
        .await;

        assert_eq!(harness.ledger.offers()[0].status, OfferStatus::Active);
        let payouts = harness.ledger.payouts();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].withdraw_type, WithdrawType::Unused);
    }

    #[tokio::test]
    async fn test_double_deposit_leaves_one_authoritative_row() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(1).deposit(ALICE, 3, 18).build(),
                BlockBuilder::new(2).deposit(ALICE, 3, 18).build(),
            ],
        )
        .await;

        let rows = harness.ledger.nft_deposits();
        let pending: Vec<_> = rows
            .iter()
            .filter(|row| row.status == TxStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source_block, 2);
    }

    #[tokio::test]
    async fn test_deposit_registered_by_next_sweep() {
        let harness = started().await;
        run_blocks(
            &harness,
            vec![BlockBuilder::new(1).deposit(ALICE, 3, 18).build()],
        )
        .await;

        harness.engine.sweep_nft_deposits().await.unwrap();
        harness.settle().await;
        let row = &harness.ledger.nft_deposits()[0];
        assert_eq!(row.status, TxStatus::Registered);
        assert_eq!(AccountId::from_base64(&row.owner_public_key).unwrap(), ALICE);
    }

    #[tokio::test]
    async fn test_transfer_signed_by_collection_admin() {
        let collection_admin = AdminIdentity::new(
            "collection-3",
            AccountId::new([0xC3; 32]),
            SecretSeed::new([0xC3; 32]),
        );
        let keys = KeyPool::builder(escrow_admin())
            .with_collection_admin(3, collection_admin)
            .build();
        let harness = TestHarness::with_pool(EngineConfig::for_testing(), keys);
        harness.engine.start().await.unwrap();

        run_blocks(
            &harness,
            vec![
                BlockBuilder::new(1).listing(ALICE, 3, 18, 2, 100).build(),
                BlockBuilder::new(2).cancel(ALICE, 3, 18).build(),
            ],
        )
        .await;

        let submitted = harness.node.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].signer, AccountId::new([0xC3; 32]));
        assert_eq!(harness.keys.free_count(), 2);
    }

    #[tokio::test]
    async fn test_shared_ledger_handle_sees_engine_writes() {
        let harness = started().await;
        let ledger: Arc<dyn LedgerStore> = harness.ledger.clone();
        run_blocks(
            &harness,
            vec![BlockBuilder::new(1).listing(ALICE, 3, 18, 2, 100).build()],
        )
        .await;
        let offer = ledger.active_offer(3, 18).await.unwrap().unwrap();
        assert_eq!(offer.seller, ALICE);
    }
}
