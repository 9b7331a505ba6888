//! # ESC-03 Chain Gateway
//!
//! Connection management, block reads, query accessors and signed call
//! submission against the chain node.
//!
//! **Subsystem ID:** 3
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Failure Model
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Disconnect / timeout | Reconnect with fixed delay, replay subscriptions, retry |
//! | Call `Failed` on chain | Returned as `CallOutcome::Failed`, never retried |
//! | Status stream lost | `StatusLost`, never retried |
//! | Not found / protocol | Returned to the caller |
//!
//! ## Module Structure
//!
//! ```text
//! esc-03-chain-gateway/
//! ├── domain/      # ChainError, CallStatus state machine, query results
//! ├── ports/       # ChainNode (outbound)
//! ├── adapters/    # HttpChainNode, InMemoryChainNode
//! ├── service.rs   # ChainGateway
//! └── config.rs    # GatewayConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{HttpChainNode, InMemoryChainNode, SubmittedCall, CONTRACT_GAS_LIMIT};
pub use config::GatewayConfig;
pub use domain::{
    evaluate, CallOutcome, CallProgress, CallStatus, ChainError, CollectionInfo, HeadInfo,
    SubmissionId,
};
pub use ports::{ChainNode, HeadSink};
pub use service::ChainGateway;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
