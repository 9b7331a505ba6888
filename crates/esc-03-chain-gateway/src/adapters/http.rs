//! # HTTP Chain Node
//!
//! `ChainNode` over a JSON/HTTP node sidecar. The sidecar owns the RPC
//! connection and the matcher ABI; this adapter signs calls and polls.
//!
//! | Method | Path |
//! |--------|------|
//! | GET | `/health` |
//! | GET | `/blocks/head` |
//! | GET | `/blocks/{n}` |
//! | POST | `/calls` |
//! | GET | `/calls/{id}` |
//! | GET | `/nft/{collection}/{token}/metadata` |
//! | GET | `/nft/{collection}/{token}/owner` |
//! | GET | `/collections/{id}` |
//! | GET | `/accounts/{account}/balance` |
//! | GET | `/matcher/{matcher}/asks/{collection}/{token}` |
//!
//! Head subscriptions are emulated by polling `/blocks/head`. A subscription
//! dies with the connection it was made on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use esc_01_key_pool::AdminIdentity;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Balance, BlockNumber, BlockView, ChainCall, CollectionId, TokenId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::domain::{CallStatus, ChainError, CollectionInfo, HeadInfo, SubmissionId};
use crate::ports::{ChainNode, HeadSink};

/// Gas limit attached to matcher contract calls.
pub const CONTRACT_GAS_LIMIT: u64 = 1_000_000_000_000;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    signer: AccountId,
    call: &'a ChainCall,
    gas_limit: u64,
    signature: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: SubmissionId,
}

#[derive(Deserialize)]
struct OwnerResponse {
    owner: AccountId,
}

#[derive(Deserialize)]
struct BalanceResponse {
    free: String,
}

#[derive(Deserialize)]
struct AskResponse {
    ask_id: Option<u64>,
}

struct Inner {
    client: reqwest::Client,
    base: String,
    poll_interval: Duration,
    connected: AtomicBool,
    epoch: AtomicU64,
}

/// HTTP chain node client.
#[derive(Clone)]
pub struct HttpChainNode {
    inner: Arc<Inner>,
}

impl HttpChainNode {
    /// Client for the endpoint in `config`.
    pub fn new(config: &GatewayConfig) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ChainError::Protocol(format!("http client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base: config.endpoint.trim_end_matches('/').to_string(),
                poll_interval: config.poll_interval(),
                connected: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
            }),
        })
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn transport_error(&self, context: &str, err: reqwest::Error) -> ChainError {
        if err.is_timeout() {
            ChainError::Timeout(format!("{context}: {err}"))
        } else if err.is_connect() || err.is_request() {
            if self.connected.swap(false, Ordering::AcqRel) {
                warn!("[esc-03] Lost connection to {}: {}", self.base, err);
            }
            ChainError::Disconnected(format!("{context}: {err}"))
        } else {
            ChainError::Protocol(format!("{context}: {err}"))
        }
    }

    fn status_error(&self, context: &str, status: StatusCode, body: String) -> ChainError {
        match status {
            StatusCode::NOT_FOUND => ChainError::NotFound(context.to_string()),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                self.connected.store(false, Ordering::Release);
                ChainError::Disconnected(format!("{context}: {status}"))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ChainError::Rejected(format!("{context}: {body}"))
            }
            _ => ChainError::Protocol(format!("{context}: {status} {body}")),
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        context: &str,
        response: reqwest::Response,
    ) -> Result<T, ChainError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(context, status, body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ChainError::Protocol(format!("{context}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ChainError::Disconnected(format!("GET {path}: not connected")));
        }
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;
        self.decode(path, response).await
    }
}

#[async_trait]
impl ChainNode for HttpChainNode {
    async fn connect(&self) -> Result<(), ChainError> {
        let inner = &self.inner;
        let response = inner
            .client
            .get(inner.url("/health"))
            .send()
            .await
            .map_err(|e| inner.transport_error("/health", e))?;
        if !response.status().is_success() {
            return Err(ChainError::Disconnected(format!(
                "/health answered {}",
                response.status()
            )));
        }

        inner.epoch.fetch_add(1, Ordering::AcqRel);
        inner.connected.store(true, Ordering::Release);
        info!("[esc-03] Connected to chain node {}", inner.base);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    async fn watch_heads(&self, sink: HeadSink) -> Result<(), ChainError> {
        let mut last = self.best_head().await?;
        sink(last);

        let inner = Arc::clone(&self.inner);
        let epoch = inner.epoch.load(Ordering::Acquire);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.poll_interval).await;
                if inner.epoch.load(Ordering::Acquire) != epoch {
                    break;
                }
                match inner.get_json::<HeadInfo>("/blocks/head").await {
                    Ok(head) if head.number > last => {
                        last = head.number;
                        sink(last);
                    }
                    Ok(_) => {}
                    Err(e) if e.is_transient() => {
                        debug!("[esc-03] Head subscription ended: {}", e);
                        break;
                    }
                    Err(e) => warn!("[esc-03] Head poll failed: {}", e),
                }
            }
        });
        Ok(())
    }

    async fn best_head(&self) -> Result<BlockNumber, ChainError> {
        let head: HeadInfo = self.inner.get_json("/blocks/head").await?;
        Ok(head.number)
    }

    async fn read_block(&self, number: BlockNumber) -> Result<BlockView, ChainError> {
        self.inner.get_json(&format!("/blocks/{number}")).await
    }

    async fn submit(
        &self,
        signer: &AdminIdentity,
        call: &ChainCall,
    ) -> Result<mpsc::Receiver<CallStatus>, ChainError> {
        let inner = &self.inner;
        if !inner.connected.load(Ordering::Acquire) {
            return Err(ChainError::Disconnected("POST /calls: not connected".to_string()));
        }

        let payload = serde_json::to_vec(call)
            .map_err(|e| ChainError::Protocol(format!("encode call: {e}")))?;
        let key = SigningKey::from_bytes(signer.seed().expose());
        let signature = key.sign(&payload);

        let request = SubmitRequest {
            signer: signer.account(),
            call,
            gas_limit: CONTRACT_GAS_LIMIT,
            signature: hex::encode(signature.to_bytes()),
        };
        let response = inner
            .client
            .post(inner.url("/calls"))
            .json(&request)
            .send()
            .await
            .map_err(|e| inner.transport_error("/calls", e))?;
        let submitted: SubmitResponse = inner.decode("/calls", response).await?;
        debug!(
            "[esc-03] Submitted {} as {} (id {})",
            call,
            signer.label(),
            submitted.id.0
        );

        let (tx, rx) = mpsc::channel(8);
        let inner = Arc::clone(&self.inner);
        let path = format!("/calls/{}", submitted.id.0);
        tokio::spawn(async move {
            let mut previous: Option<CallStatus> = None;
            loop {
                match inner.get_json::<CallStatus>(&path).await {
                    Ok(status) => {
                        let terminal = status.is_terminal();
                        if previous.as_ref() != Some(&status) {
                            previous = Some(status.clone());
                            if tx.send(status).await.is_err() {
                                break;
                            }
                        }
                        if terminal {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("[esc-03] Stopped tracking {}: {}", path, e);
                        break;
                    }
                }
                tokio::time::sleep(inner.poll_interval).await;
            }
        });
        Ok(rx)
    }

    async fn token_metadata(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<serde_json::Value, ChainError> {
        self.inner
            .get_json(&format!("/nft/{collection_id}/{token_id}/metadata"))
            .await
    }

    async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<AccountId, ChainError> {
        let response: OwnerResponse = self
            .inner
            .get_json(&format!("/nft/{collection_id}/{token_id}/owner"))
            .await?;
        Ok(response.owner)
    }

    async fn collection(&self, collection_id: CollectionId) -> Result<CollectionInfo, ChainError> {
        self.inner
            .get_json(&format!("/collections/{collection_id}"))
            .await
    }

    async fn balance(&self, account: &AccountId) -> Result<Balance, ChainError> {
        let response: BalanceResponse = self
            .inner
            .get_json(&format!("/accounts/{account}/balance"))
            .await?;
        Balance::from_dec_str(&response.free)
            .map_err(|e| ChainError::Protocol(format!("balance of {account}: {e:?}")))
    }

    async fn ask_for_token(
        &self,
        matcher: &AccountId,
        collection_id: CollectionId,
        token_id: TokenId,
    ) -> Result<Option<u64>, ChainError> {
        let response: AskResponse = self
            .inner
            .get_json(&format!("/matcher/{matcher}/asks/{collection_id}/{token_id}"))
            .await?;
        Ok(response.ask_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let mut config = GatewayConfig::for_testing();
        config.endpoint = "http://node.local:9933/".to_string();
        let node = HttpChainNode::new(&config).unwrap();
        assert_eq!(node.inner.url("/blocks/head"), "http://node.local:9933/blocks/head");
    }

    #[test]
    fn test_new_client_starts_disconnected() {
        let node = HttpChainNode::new(&GatewayConfig::for_testing()).unwrap();
        assert!(!node.is_connected());
    }

    #[tokio::test]
    async fn test_reads_refused_before_connect() {
        let node = HttpChainNode::new(&GatewayConfig::for_testing()).unwrap();
        let err = node.read_block(1).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_unavailable_marks_disconnected() {
        let node = HttpChainNode::new(&GatewayConfig::for_testing()).unwrap();
        node.inner.connected.store(true, Ordering::Release);
        let err = node
            .inner
            .status_error("/blocks/3", StatusCode::SERVICE_UNAVAILABLE, String::new());
        assert!(err.is_transient());
        assert!(!node.is_connected());
        assert_eq!(
            node.inner.status_error("/blocks/3", StatusCode::NOT_FOUND, String::new()),
            ChainError::NotFound("/blocks/3".to_string())
        );
    }
}
