//! # Adapters
//!
//! `ChainNode` implementations.
//!
//! - `HttpChainNode`: JSON/HTTP node sidecar (production).
//! - `InMemoryChainNode`: scriptable node for tests.

pub mod http;
pub mod memory;

pub use http::{HttpChainNode, CONTRACT_GAS_LIMIT};
pub use memory::{InMemoryChainNode, SubmittedCall};
