//! # Outbound Ports
//!
//! The raw chain node client the gateway drives. Implementations do no
//! retrying of their own; reconnect policy lives in `ChainGateway`.

use std::sync::Arc;

use async_trait::async_trait;
use esc_01_key_pool::AdminIdentity;
use shared_types::{AccountId, Balance, BlockNumber, BlockView, ChainCall, CollectionId, TokenId};
use tokio::sync::mpsc;

use crate::domain::{CallStatus, ChainError, CollectionInfo};

/// Callback invoked with every new best block number.
pub type HeadSink = Arc<dyn Fn(BlockNumber) + Send + Sync>;

/// Chain node client - outbound port.
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Open a connection. Subscriptions of a previous connection are gone.
    async fn connect(&self) -> Result<(), ChainError>;

    /// Whether the current connection is alive.
    fn is_connected(&self) -> bool;

    /// Register a head subscription on the current connection.
    async fn watch_heads(&self, sink: HeadSink) -> Result<(), ChainError>;

    /// Current best block number.
    async fn best_head(&self) -> Result<BlockNumber, ChainError>;

    /// Block `number` with its extrinsics and events.
    async fn read_block(&self, number: BlockNumber) -> Result<BlockView, ChainError>;

    /// Sign `call` with `signer` and submit it. Statuses stream through the
    /// receiver until a terminal one.
    async fn submit(
        &self,
        signer: &AdminIdentity,
        call: &ChainCall,
    ) -> Result<mpsc::Receiver<CallStatus>, ChainError>;

    /// Metadata document of a token.
    async fn token_metadata(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<serde_json::Value, ChainError>;

    /// Current owner of a token.
    async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<AccountId, ChainError>;

    /// Collection metadata.
    async fn collection(&self, collection_id: CollectionId) -> Result<CollectionInfo, ChainError>;

    /// Free balance of an account.
    async fn balance(&self, account: &AccountId) -> Result<Balance, ChainError>;

    /// Ask id the matcher holds for a token, if any.
    async fn ask_for_token(
        &self,
        matcher: &AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<u64>, ChainError>;
}
