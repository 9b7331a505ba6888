//! # In-Memory Chain Node
//!
//! Scriptable `ChainNode` for tests and local runs: blocks are pushed by the
//! test, submitted calls are recorded, and disconnects can be injected.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use esc_01_key_pool::AdminIdentity;
use parking_lot::Mutex;
use shared_types::{
    AccountId, Balance, BlockNumber, BlockView, ChainCall, ChainEvent, CollectionId, EventRecord,
    Phase, TokenId,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{evaluate, CallProgress, CallStatus, ChainError, CollectionInfo};
use crate::ports::{ChainNode, HeadSink};

/// A call recorded by [`InMemoryChainNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedCall {
    /// Account that signed the call.
    pub signer: AccountId,
    /// The call.
    pub call: ChainCall,
}

#[derive(Default)]
struct NodeState {
    connected: bool,
    connects: u32,
    failing_connects: u32,
    failing_reads: u32,
    head: BlockNumber,
    blocks: BTreeMap<BlockNumber, BlockView>,
    sinks: Vec<HeadSink>,
    submitted: Vec<SubmittedCall>,
    scripts: VecDeque<Vec<CallStatus>>,
    metadata: HashMap<(CollectionId, TokenId), serde_json::Value>,
    owners: HashMap<(CollectionId, TokenId), AccountId>,
    collections: HashMap<CollectionId, CollectionInfo>,
    balances: HashMap<AccountId, Balance>,
    asks: HashMap<(CollectionId, TokenId), u64>,
}

/// In-memory chain node.
#[derive(Default)]
pub struct InMemoryChainNode {
    state: Mutex<NodeState>,
}

impl InMemoryChainNode {
    /// Disconnected node with no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block; raises the head and notifies subscribers if it is newer.
    pub fn push_block(&self, block: BlockView) {
        let number = block.number;
        let sinks = {
            let mut state = self.state.lock();
            state.blocks.insert(number, block);
            if number <= state.head {
                return;
            }
            state.head = number;
            state.sinks.clone()
        };
        for sink in sinks {
            sink(number);
        }
    }

    /// Move the head without adding a block; blocks up to it read as empty.
    pub fn set_head(&self, number: BlockNumber) {
        let sinks = {
            let mut state = self.state.lock();
            state.head = number;
            state.sinks.clone()
        };
        for sink in sinks {
            sink(number);
        }
    }

    /// Simulate the node closing the connection.
    pub fn drop_connection(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.sinks.clear();
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.state.lock().failing_connects = count;
    }

    /// Make the next `count` block reads drop the connection.
    pub fn fail_next_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// Statuses the next submitted call will report.
    pub fn script_next_call(&self, statuses: Vec<CallStatus>) {
        self.state.lock().scripts.push_back(statuses);
    }

    /// Calls submitted so far.
    pub fn submitted(&self) -> Vec<SubmittedCall> {
        self.state.lock().submitted.clone()
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.state.lock().connects
    }

    /// Number of live head subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Set a token's metadata document.
    pub fn set_token_metadata(&self, collection_id: CollectionId, token_id: TokenId, value: serde_json::Value) {
        self.state.lock().metadata.insert((collection_id, token_id), value);
    }

    /// Set a token's owner.
    pub fn set_token_owner(&self, collection_id: CollectionId, token_id: TokenId, owner: AccountId) {
        self.state.lock().owners.insert((collection_id, token_id), owner);
    }

    /// Register collection metadata.
    pub fn set_collection(&self, info: CollectionInfo) {
        self.state.lock().collections.insert(info.id, info);
    }

    /// Set an account balance.
    pub fn set_balance(&self, account: AccountId, balance: Balance) {
        self.state.lock().balances.insert(account, balance);
    }

    /// Record an open matcher ask for a token.
    pub fn set_ask(&self, collection_id: CollectionId, token_id: TokenId, ask_id: u64) {
        self.state.lock().asks.insert((collection_id, token_id), ask_id);
    }

    /// Remove the matcher ask for a token.
    pub fn clear_ask(&self, collection_id: CollectionId, token_id: TokenId) {
        self.state.lock().asks.remove(&(collection_id, token_id));
    }

    fn ensure_connected(state: &NodeState) -> Result<(), ChainError> {
        if state.connected {
            Ok(())
        } else {
            Err(ChainError::Disconnected("in-memory node offline".to_string()))
        }
    }

    fn default_script() -> Vec<CallStatus> {
        vec![
            CallStatus::Ready,
            CallStatus::InBlock {
                events: vec![EventRecord {
                    phase: Phase::ApplyExtrinsic(0),
                    event: ChainEvent::ExtrinsicSuccess,
                }],
            },
        ]
    }
}

#[async_trait]
impl ChainNode for InMemoryChainNode {
    async fn connect(&self) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ChainError::Disconnected("connection refused".to_string()));
        }
        if !state.connected {
            state.connected = true;
            state.connects += 1;
            state.sinks.clear();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn watch_heads(&self, sink: HeadSink) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        Self::ensure_connected(&state)?;
        state.sinks.push(sink);
        Ok(())
    }

    async fn best_head(&self) -> Result<BlockNumber, ChainError> {
        let state = self.state.lock();
        Self::ensure_connected(&state)?;
        Ok(state.head)
    }

    async fn read_block(&self, number: BlockNumber) -> Result<BlockView, ChainError> {
        let mut state = self.state.lock();
        Self::ensure_connected(&state)?;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            state.connected = false;
            state.sinks.clear();
            return Err(ChainError::Disconnected(format!("dropped while reading #{number}")));
        }
        match state.blocks.get(&number) {
            Some(block) => Ok(block.clone()),
            None if number <= state.head => Ok(BlockView {
                number,
                ..BlockView::default()
            }),
            None => Err(ChainError::NotFound(format!("block #{number}"))),
        }
    }

    async fn submit(
        &self,
        signer: &AdminIdentity,
        call: &ChainCall,
    ) -> Result<mpsc::Receiver<CallStatus>, ChainError> {
        let mut state = self.state.lock();
        Self::ensure_connected(&state)?;

        state.submitted.push(SubmittedCall {
            signer: signer.account(),
            call: call.clone(),
        });
        let script = state.scripts.pop_front().unwrap_or_else(Self::default_script);

        let lands = script
            .iter()
            .any(|status| matches!(evaluate(status.clone()), CallProgress::Success(_)));
        if let (true, ChainCall::NftTransfer {
            recipient,
            collection_id,
            token_id,
            ..
        }) = (lands, call)
        {
            state.owners.insert((*collection_id, *token_id), *recipient);
        }
        debug!("[esc-03] In-memory node accepted {}", call);

        let (tx, rx) = mpsc::channel(script.len().max(1));
        for status in script {
            // Capacity matches the script length.
            let _ = tx.try_send(status);
        }
        Ok(rx)
    }

    async fn token_metadata(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<serde_json::Value, ChainError> {
        let state = self.state.lock();
        Self::ensure_connected(&state)?;
        state
            .metadata
            .get(&(collection_id, token_id))
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("metadata of {collection_id}/{token_id}")))
    }

    async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<AccountId, ChainError> {
        let state = self.state.lock();
        Self::ensure_connected(&state)?;
        state
            .owners
            .get(&(collection_id, token_id))
            .copied()
            .ok_or_else(|| ChainError::NotFound(format!("token {collection_id}/{token_id}")))
    }

    async fn collection(&self, collection_id: CollectionId) -> Result<CollectionInfo, ChainError> {
        let state = self.state.lock();
        Self::ensure_connected(&state)?;
        state
            .collections
            .get(&collection_id)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("collection {collection_id}")))
    }

    async fn balance(&self, account: &AccountId) -> Result<Balance, ChainError> {
        let state = self.state.lock();
        Self::ensure_connected(&state)?;
        Ok(state.balances.get(account).copied().unwrap_or_default())
    }

    async fn ask_for_token(
        &self,
        _matcher: &AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<u64>, ChainError> {
        let state = self.state.lock();
        Self::ensure_connected(&state)?;
        Ok(state.asks.get(&(collection_id, token_id)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esc_01_key_pool::SecretSeed;

    fn admin() -> AdminIdentity {
        AdminIdentity::new("escrow", AccountId::new([7; 32]), SecretSeed::new([7; 32]))
    }

    #[tokio::test]
    async fn test_offline_node_refuses_reads() {
        let node = InMemoryChainNode::new();
        assert!(matches!(
            node.read_block(1).await,
            Err(ChainError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn test_blocks_below_head_read_empty() {
        let node = InMemoryChainNode::new();
        node.connect().await.unwrap();
        node.set_head(5);
        let block = node.read_block(3).await.unwrap();
        assert_eq!(block.number, 3);
        assert!(block.extrinsics.is_empty());
        assert!(matches!(node.read_block(6).await, Err(ChainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_drop_connection_clears_subscriptions() {
        let node = InMemoryChainNode::new();
        node.connect().await.unwrap();
        node.watch_heads(std::sync::Arc::new(|_: BlockNumber| {})).await.unwrap();
        assert_eq!(node.subscriber_count(), 1);
        node.drop_connection();
        assert_eq!(node.subscriber_count(), 0);
        assert!(!node.is_connected());
    }

    #[tokio::test]
    async fn test_successful_transfer_moves_token() {
        let node = InMemoryChainNode::new();
        node.connect().await.unwrap();
        let buyer = AccountId::new([3; 32]);
        let mut rx = node
            .submit(&admin(), &ChainCall::nft_transfer(buyer, 25, 1))
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(CallStatus::Ready));
        assert!(matches!(rx.recv().await, Some(CallStatus::InBlock { .. })));
        assert_eq!(rx.recv().await, None);
        assert_eq!(node.token_owner(25, 1).await.unwrap(), buyer);
        assert_eq!(node.submitted().len(), 1);
    }
}
