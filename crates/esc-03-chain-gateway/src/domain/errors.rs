//! # Gateway Errors
//!
//! Only I/O-layer failures are transient. A call the chain rejected, or a
//! query for something that does not exist, is final.

use thiserror::Error;

/// Chain gateway errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Node unreachable or connection dropped.
    #[error("chain node disconnected: {0}")]
    Disconnected(String),

    /// Request did not complete in time.
    #[error("chain request timed out: {0}")]
    Timeout(String),

    /// Node refused the submitted call.
    #[error("call rejected by node: {0}")]
    Rejected(String),

    /// The status stream of a submitted call ended before a terminal status.
    /// Not retried: the call may still land.
    #[error("status of submitted call lost: {0}")]
    StatusLost(String),

    /// Block, token, collection or ask not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Node answered with something we cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Gateway was shut down while waiting to reconnect.
    #[error("gateway shut down")]
    Shutdown,
}

impl ChainError {
    /// Whether retrying after a reconnect may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Disconnected(_) | ChainError::Timeout(_))
    }
}
