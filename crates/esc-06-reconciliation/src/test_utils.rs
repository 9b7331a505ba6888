//! Test utilities for the reconciliation engine.
//!
//! [`TestHarness`] wires an engine over the in-memory chain node and ledger;
//! [`BlockBuilder`] assembles blocks carrying escrow extrinsics with the
//! events the chain would emit for them.
//!
//! # Example
//!
//! ```rust
//! use esc_06_reconciliation::test_utils::{BlockBuilder, TestHarness, ALICE};
//!
//! # tokio_test::block_on(async {
//! let harness = TestHarness::new();
//! harness.node.push_block(BlockBuilder::new(1).listing(ALICE, 3, 18, 2, 100).build());
//! harness.engine.start().await.unwrap();
//! harness.engine.process_block(1).await.unwrap();
//! assert_eq!(harness.ledger.offers().len(), 1);
//! # });
//! ```

use std::sync::Arc;

use esc_01_key_pool::{AdminIdentity, KeyPool, SecretSeed};
use esc_02_task_scheduler::{StopSignal, TaskScheduler};
use esc_03_chain_gateway::{ChainGateway, ChainNode, GatewayConfig, InMemoryChainNode};
use esc_04_extrinsic_classifier::{
    encode_listing_payload, ClassifierContext, ListingPayload, CANCEL_SELECTOR, PURCHASE_SELECTOR,
    WITHDRAW_SELECTOR,
};
use esc_05_ledger_store::{InMemoryLedger, LedgerStore};
use shared_types::{
    AccountId, Balance, BlockNumber, BlockView, CallView, ChainEvent, CollectionId, EventRecord,
    ExtrinsicView, MatcherEvent, Phase, QuoteId, TokenId,
};

use crate::application::ReconciliationEngine;
use crate::config::EngineConfig;

/// Primary escrow admin account.
pub const ESCROW_ADMIN: AccountId = AccountId::new([0xE5; 32]);
/// Matcher contract address.
pub const MATCHER: AccountId = AccountId::new([0x4D; 32]);
/// A seller.
pub const ALICE: AccountId = AccountId::new([0xA1; 32]);
/// A buyer.
pub const BOB: AccountId = AccountId::new([0xB0; 32]);

/// Escrow admin identity used as the pool's primary key.
pub fn escrow_admin() -> AdminIdentity {
    AdminIdentity::new("escrow-admin", ESCROW_ADMIN, SecretSeed::new([0xE5; 32]))
}

/// Engine over in-memory collaborators.
pub struct TestHarness {
    /// Chain node.
    pub node: Arc<InMemoryChainNode>,
    /// Ledger.
    pub ledger: Arc<InMemoryLedger>,
    /// Key pool.
    pub keys: KeyPool,
    /// Stop signal shared by scheduler, gateway and engine.
    pub stop: StopSignal,
    /// The engine.
    pub engine: ReconciliationEngine,
}

impl TestHarness {
    /// Harness with [`EngineConfig::for_testing`] and a primary-only pool.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::for_testing())
    }

    /// Harness with `config` and a primary-only pool.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_pool(config, KeyPool::builder(escrow_admin()).build())
    }

    /// Harness with `config` and `keys`.
    pub fn with_pool(config: EngineConfig, keys: KeyPool) -> Self {
        let node = Arc::new(InMemoryChainNode::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let stop = StopSignal::new();
        let gateway = Arc::new(
            ChainGateway::new(
                Arc::clone(&node) as Arc<dyn ChainNode>,
                GatewayConfig::for_testing(),
            )
            .with_shutdown(stop.token().clone()),
        );
        let engine = ReconciliationEngine::new(
            gateway,
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            keys.clone(),
            TaskScheduler::with_default_limit(stop.clone()),
            ClassifierContext::new(ESCROW_ADMIN, MATCHER),
            config,
        );
        Self {
            node,
            ledger,
            keys,
            stop,
            engine,
        }
    }

    /// Wait for every admitted unit.
    pub async fn settle(&self) {
        self.engine.scheduler().drain().await;
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a block of escrow extrinsics. Each extrinsic gets its success
/// marker unless added through a `failed_*` method.
#[derive(Clone, Debug)]
pub struct BlockBuilder {
    block: BlockView,
}

impl BlockBuilder {
    /// Empty block `number`.
    pub fn new(number: BlockNumber) -> Self {
        Self {
            block: BlockView {
                number,
                hash: format!("0x{number:064x}"),
                ..BlockView::default()
            },
        }
    }

    fn push(mut self, extrinsic: ExtrinsicView, events: Vec<ChainEvent>, success: bool) -> Self {
        let index = u32::try_from(self.block.extrinsics.len()).unwrap_or(u32::MAX);
        self.block.extrinsics.push(extrinsic);
        let mut records: Vec<EventRecord> = events
            .into_iter()
            .map(|event| EventRecord {
                phase: Phase::ApplyExtrinsic(index),
                event,
            })
            .collect();
        records.push(EventRecord {
            phase: Phase::ApplyExtrinsic(index),
            event: if success {
                ChainEvent::ExtrinsicSuccess
            } else {
                ChainEvent::ExtrinsicFailed
            },
        });
        self.block.events.extend(records);
        self
    }

    fn matcher_call(signer: AccountId, data: Vec<u8>) -> ExtrinsicView {
        ExtrinsicView {
            signer: Some(signer),
            call: CallView::ContractCall {
                dest: MATCHER,
                value: 0,
                gas_limit: 0,
                data,
            },
        }
    }

    fn emitted(event: MatcherEvent) -> ChainEvent {
        ChainEvent::ContractEmitted {
            contract: MATCHER,
            event: Some(event),
        }
    }

    /// `sender` transfers a token to the escrow admin.
    pub fn deposit(self, sender: AccountId, collection_id: CollectionId, token_id: TokenId) -> Self {
        let extrinsic = ExtrinsicView {
            signer: Some(sender),
            call: CallView::NftTransfer {
                recipient: ESCROW_ADMIN,
                collection_id,
                token_id,
                value: 0,
            },
        };
        self.push(extrinsic, Vec::new(), true)
    }

    fn listing_call(
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: u128,
    ) -> ExtrinsicView {
        Self::matcher_call(
            seller,
            encode_listing_payload(&ListingPayload {
                collection_id,
                token_id,
                quote_id,
                price,
            }),
        )
    }

    /// `seller` lists a token.
    pub fn listing(
        self,
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: u128,
    ) -> Self {
        let extrinsic = Self::listing_call(seller, collection_id, token_id, quote_id, price);
        self.push(extrinsic, Vec::new(), true)
    }

    /// A listing call that failed on chain.
    pub fn failed_listing(
        self,
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: u128,
    ) -> Self {
        let extrinsic = Self::listing_call(seller, collection_id, token_id, quote_id, price);
        self.push(extrinsic, Vec::new(), false)
    }

    /// `buyer` buys a token listed by `seller`.
    pub fn purchase(
        self,
        buyer: AccountId,
        seller: AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
        quote_id: QuoteId,
        price: u128,
    ) -> Self {
        let events = vec![
            Self::emitted(MatcherEvent::WithdrawNft {
                owner: buyer,
                collection_id,
                token_id,
            }),
            Self::emitted(MatcherEvent::WithdrawQuoteMatched {
                seller,
                quote_id,
                amount: Balance::from(price),
            }),
        ];
        let extrinsic = Self::matcher_call(buyer, PURCHASE_SELECTOR.to_vec());
        self.push(extrinsic, events, true)
    }

    /// A purchase call whose settlement events are missing.
    pub fn purchase_without_events(self, buyer: AccountId) -> Self {
        let extrinsic = Self::matcher_call(buyer, PURCHASE_SELECTOR.to_vec());
        self.push(extrinsic, Vec::new(), true)
    }

    /// `seller` cancels a listing.
    pub fn cancel(self, seller: AccountId, collection_id: CollectionId, token_id: TokenId) -> Self {
        let events = vec![Self::emitted(MatcherEvent::WithdrawNft {
            owner: seller,
            collection_id,
            token_id,
        })];
        let extrinsic = Self::matcher_call(seller, CANCEL_SELECTOR.to_vec());
        self.push(extrinsic, events, true)
    }

    /// `withdrawer` withdraws unused quote balance.
    pub fn withdraw(self, withdrawer: AccountId, quote_id: QuoteId, amount: u128) -> Self {
        let events = vec![Self::emitted(MatcherEvent::WithdrawQuoteUnused {
            withdrawer,
            quote_id,
            amount: Balance::from(amount),
        })];
        let extrinsic = Self::matcher_call(withdrawer, WITHDRAW_SELECTOR.to_vec());
        self.push(extrinsic, events, true)
    }

    /// The block.
    pub fn build(self) -> BlockView {
        self.block
    }
}
