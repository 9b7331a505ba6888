//! # Chain Gateway Service
//!
//! Resilience glue around a [`ChainNode`]:
//!
//! - `connect` retries with a fixed delay and replays every registered head
//!   subscription on the new connection.
//! - Reads and queries retry transient failures after reconnecting. Anything
//!   else, including a `Failed` call outcome, goes straight to the caller.
//! - `submit_call` drives the call status stream to a terminal outcome and
//!   releases the signer lease as soon as the call left the pool.

use std::future::Future;
use std::sync::Arc;

use esc_01_key_pool::KeyLease;
use parking_lot::Mutex;
use shared_types::{AccountId, Balance, BlockNumber, BlockView, ChainCall, CollectionId, TokenId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::GatewayConfig;
use crate::domain::{evaluate, CallOutcome, CallProgress, ChainError, CollectionInfo};
use crate::ports::{ChainNode, HeadSink};

/// Reconnecting front of the chain node.
pub struct ChainGateway {
    node: Arc<dyn ChainNode>,
    config: GatewayConfig,
    subscriptions: Mutex<Vec<HeadSink>>,
    reconnect: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl ChainGateway {
    /// Gateway over `node`.
    pub fn new(node: Arc<dyn ChainNode>, config: GatewayConfig) -> Self {
        Self {
            node,
            config,
            subscriptions: Mutex::new(Vec::new()),
            reconnect: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Abort reconnect waits once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Connect if not connected, retrying transient failures with a fixed
    /// delay, then replay all head subscriptions.
    pub async fn connect(&self) -> Result<(), ChainError> {
        let _guard = self.reconnect.lock().await;
        if self.node.is_connected() {
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(ChainError::Shutdown);
            }
            attempt += 1;

            match self.connect_once().await {
                Ok(replayed) => {
                    info!(
                        "[esc-03] Chain connection up after {} attempt(s), {} subscription(s) restored",
                        attempt, replayed
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    warn!("[esc-03] Connect attempt {} failed: {}", attempt, e);
                    self.pause().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect_once(&self) -> Result<usize, ChainError> {
        self.node.connect().await?;
        let sinks = self.subscriptions.lock().clone();
        for sink in &sinks {
            self.node.watch_heads(Arc::clone(sink)).await?;
        }
        Ok(sinks.len())
    }

    async fn pause(&self) -> Result<(), ChainError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(ChainError::Shutdown),
            _ = tokio::time::sleep(self.config.reconnect_delay()) => Ok(()),
        }
    }

    /// Whether the node connection is alive.
    pub fn is_connected(&self) -> bool {
        self.node.is_connected()
    }

    /// Register `callback` for new heads. It survives reconnects.
    pub async fn subscribe_new_heads<F>(&self, callback: F) -> Result<(), ChainError>
    where
        F: Fn(BlockNumber) + Send + Sync + 'static,
    {
        let sink: HeadSink = Arc::new(callback);
        self.subscriptions.lock().push(Arc::clone(&sink));

        if !self.node.is_connected() {
            // A fresh connection replays the registry, this sink included.
            return self.connect().await;
        }
        match self.node.watch_heads(sink).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => self.connect().await,
            Err(e) => Err(e),
        }
    }

    /// Run `op`, reconnecting and retrying for as long as it fails transiently.
    pub async fn with_reconnect<T, F, Fut>(&self, what: &str, op: F) -> Result<T, ChainError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        loop {
            match op().await {
                Err(e) if e.is_transient() => {
                    warn!("[esc-03] {} failed: {}; retrying after reconnect", what, e);
                    self.pause().await?;
                    self.connect().await?;
                }
                other => return other,
            }
        }
    }

    /// Fetch block `number`.
    pub async fn read_block(&self, number: BlockNumber) -> Result<BlockView, ChainError> {
        self.with_reconnect("read_block", || self.node.read_block(number))
            .await
    }

    /// Current best block number.
    pub async fn chain_head(&self) -> Result<BlockNumber, ChainError> {
        self.with_reconnect("chain_head", || self.node.best_head())
            .await
    }

    /// Sign `call` with the leased key, submit it, and wait for the outcome.
    ///
    /// The lease is released once the call reports `Ready` or `Broadcast`.
    /// Only submission itself is retried on disconnect; a call whose status
    /// stream breaks off yields `StatusLost`, since it may still land.
    pub async fn submit_call(
        &self,
        lease: &KeyLease,
        call: &ChainCall,
    ) -> Result<CallOutcome, ChainError> {
        let mut statuses = self
            .with_reconnect("submit_call", || self.node.submit(lease.identity(), call))
            .await?;
        debug!("[esc-03] {} submitted by {}", call, lease.identity().label());

        while let Some(status) = statuses.recv().await {
            match evaluate(status) {
                CallProgress::NotReady => {
                    if !lease.is_released() {
                        lease.release();
                        trace!("[esc-03] Signer {} released early", lease.identity().label());
                    }
                }
                CallProgress::Success(events) => {
                    info!("[esc-03] {} succeeded", call);
                    return Ok(CallOutcome::Success(events));
                }
                CallProgress::Failed(events) => {
                    warn!("[esc-03] {} failed on chain", call);
                    return Ok(CallOutcome::Failed(events));
                }
            }
        }

        Err(ChainError::StatusLost(call.to_string()))
    }

    /// Metadata document of a token.
    pub async fn token_metadata(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<serde_json::Value, ChainError> {
        self.with_reconnect("token_metadata", || {
            self.node.token_metadata(collection_id, token_id)
        })
        .await
    }

    /// Current owner of a token.
    pub async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<AccountId, ChainError> {
        self.with_reconnect("token_owner", || self.node.token_owner(collection_id, token_id))
            .await
    }

    /// Collection metadata.
    pub async fn collection(&self, collection_id: CollectionId) -> Result<CollectionInfo, ChainError> {
        self.with_reconnect("collection", || self.node.collection(collection_id))
            .await
    }

    /// Free balance of an account.
    pub async fn balance(&self, account: &AccountId) -> Result<Balance, ChainError> {
        self.with_reconnect("balance", || self.node.balance(account))
            .await
    }

    /// Ask id the matcher holds for a token, if any.
    pub async fn ask_for_token(
        &self,
        matcher: &AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<u64>, ChainError> {
        self.with_reconnect("ask_for_token", || {
            self.node.ask_for_token(matcher, collection_id, token_id)
        })
        .await
    }

    /// Periodically reconnect an idle, dropped connection so head
    /// subscriptions come back without waiting for the next read.
    pub fn spawn_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gateway.config.watchdog_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = gateway.shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if gateway.node.is_connected() {
                    continue;
                }
                info!("[esc-03] Watchdog found the connection down, reconnecting");
                match gateway.connect().await {
                    Ok(()) => {}
                    Err(ChainError::Shutdown) => break,
                    Err(e) => warn!("[esc-03] Watchdog reconnect failed: {}", e),
                }
            }
            debug!("[esc-03] Watchdog stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChainNode;
    use crate::domain::CallStatus;
    use esc_01_key_pool::{AdminIdentity, KeyPool, SecretSeed};
    use shared_types::{AuthGroup, ChainEvent, EventRecord, Phase};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryChainNode>, Arc<ChainGateway>) {
        let node = Arc::new(InMemoryChainNode::new());
        let gateway = Arc::new(ChainGateway::new(
            Arc::clone(&node) as Arc<dyn ChainNode>,
            GatewayConfig::for_testing(),
        ));
        (node, gateway)
    }

    fn pool() -> KeyPool {
        KeyPool::builder(AdminIdentity::new(
            "escrow",
            AccountId::new([1; 32]),
            SecretSeed::new([1; 32]),
        ))
        .build()
    }

    fn success() -> Vec<EventRecord> {
        vec![EventRecord {
            phase: Phase::ApplyExtrinsic(2),
            event: ChainEvent::ExtrinsicSuccess,
        }]
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_until_up() {
        let (node, gateway) = setup();
        node.fail_next_connects(3);
        gateway.connect().await.unwrap();
        assert!(gateway.is_connected());
        assert_eq!(node.connect_count(), 1);

        // Idempotent once connected.
        gateway.connect().await.unwrap();
        assert_eq!(node.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriptions_replayed_after_reconnect() {
        let (node, gateway) = setup();
        let seen = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&seen);
        gateway
            .subscribe_new_heads(move |head| sink.store(head, Ordering::SeqCst))
            .await
            .unwrap();
        assert_eq!(node.subscriber_count(), 1);

        node.drop_connection();
        node.set_head(4);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let block = gateway.read_block(4).await.unwrap();
        assert_eq!(block.number, 4);
        assert_eq!(node.subscriber_count(), 1);

        node.set_head(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_survives_mid_read_disconnect() {
        let (node, gateway) = setup();
        gateway.connect().await.unwrap();
        node.set_head(10);
        node.fail_next_reads(2);
        let block = gateway.read_block(7).await.unwrap();
        assert_eq!(block.number, 7);
        assert_eq!(node.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_final_errors_are_not_retried() {
        let (node, gateway) = setup();
        gateway.connect().await.unwrap();
        node.set_head(2);
        assert!(matches!(
            gateway.read_block(3).await,
            Err(ChainError::NotFound(_))
        ));
        assert_eq!(node.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_releases_signer_at_ready() {
        let (node, gateway) = setup();
        gateway.connect().await.unwrap();
        node.script_next_call(vec![
            CallStatus::Ready,
            CallStatus::Broadcast,
            CallStatus::InBlock { events: success() },
        ]);

        let pool = pool();
        let lease = pool.acquire(AuthGroup::Contract).await;
        let call = ChainCall::nft_transfer(AccountId::new([9; 32]), 25, 3);
        let outcome = gateway.submit_call(&lease, &call).await.unwrap();

        assert_eq!(outcome, CallOutcome::Success(success()));
        assert!(lease.is_released());
        assert_eq!(pool.free_count(), 1);
        assert_eq!(node.submitted()[0].signer, AccountId::new([1; 32]));
    }

    #[tokio::test]
    async fn test_failed_call_is_an_outcome_not_an_error() {
        let (node, gateway) = setup();
        gateway.connect().await.unwrap();
        node.script_next_call(vec![CallStatus::InBlock {
            events: vec![EventRecord {
                phase: Phase::ApplyExtrinsic(2),
                event: ChainEvent::ExtrinsicFailed,
            }],
        }]);

        let pool = pool();
        let lease = pool.acquire(AuthGroup::Contract).await;
        let call = ChainCall::nft_transfer(AccountId::new([9; 32]), 25, 3);
        let outcome = gateway.submit_call(&lease, &call).await.unwrap();

        assert!(!outcome.is_success());
        assert!(!lease.is_released());
        assert_eq!(node.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_broken_status_stream_is_status_lost() {
        let (node, gateway) = setup();
        gateway.connect().await.unwrap();
        node.script_next_call(vec![CallStatus::Ready]);

        let pool = pool();
        let lease = pool.acquire(AuthGroup::Contract).await;
        let call = ChainCall::nft_transfer(AccountId::new([9; 32]), 25, 3);
        assert!(matches!(
            gateway.submit_call(&lease, &call).await,
            Err(ChainError::StatusLost(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_restores_idle_connection() {
        let (node, gateway) = setup();
        gateway.subscribe_new_heads(|_| {}).await.unwrap();
        let watchdog = gateway.spawn_watchdog();

        node.drop_connection();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(node.is_connected());
        assert_eq!(node.subscriber_count(), 1);
        watchdog.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_reconnect() {
        let node = Arc::new(InMemoryChainNode::new());
        let token = CancellationToken::new();
        let gateway = ChainGateway::new(
            Arc::clone(&node) as Arc<dyn ChainNode>,
            GatewayConfig::for_testing(),
        )
        .with_shutdown(token.clone());
        node.fail_next_connects(u32::MAX);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });
        assert_eq!(gateway.connect().await, Err(ChainError::Shutdown));
        canceller.await.unwrap();
    }
}
