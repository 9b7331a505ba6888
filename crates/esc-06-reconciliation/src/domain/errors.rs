//! # Reconciliation Errors
//!
//! | Class | Variants | Handling |
//! |-------|----------|----------|
//! | Transient I/O | `Ledger`/`Chain` with a transient source | Retried with a fixed delay |
//! | Protocol violation | `Protocol` | Logged, action dropped |
//! | Business conflict | `NoActiveOffer`, `AlreadySettled` | Logged, action dropped |
//! | Bad secondary data | `InvalidKey` | Row flipped to Failed |
//! | Chain call rejected | `CallFailed` | Logged; deposit rows stay Pending |

use esc_02_task_scheduler::SchedulerError;
use esc_03_chain_gateway::ChainError;
use esc_04_extrinsic_classifier::ClassifyError;
use esc_05_ledger_store::LedgerError;
use shared_types::{CollectionId, EncodingError, TokenId};
use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Chain failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Escrow call without its settlement events.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ClassifyError),

    /// Settlement for a token with no Active offer.
    #[error("no active offer for token {collection_id}/{token_id}")]
    NoActiveOffer {
        /// Collection.
        collection_id: CollectionId,
        /// Token.
        token_id: TokenId,
    },

    /// The offer left Active between lookup and update.
    #[error("offer for token {collection_id}/{token_id} was settled concurrently")]
    AlreadySettled {
        /// Collection.
        collection_id: CollectionId,
        /// Token.
        token_id: TokenId,
    },

    /// Public key on a queued row does not decode.
    #[error("invalid public key: {0}")]
    InvalidKey(#[from] EncodingError),

    /// A signed call reached a block but failed.
    #[error("chain call failed: {0}")]
    CallFailed(String),

    /// Work could not be admitted.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Bad configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The stop signal fired.
    #[error("engine is shutting down")]
    Shutdown,
}

impl ReconcileError {
    /// Whether retrying after a delay may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Ledger(e) => e.is_transient(),
            ReconcileError::Chain(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether the action was dropped because the ledger disagrees with it.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ReconcileError::NoActiveOffer { .. } | ReconcileError::AlreadySettled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transience_follows_source() {
        assert!(ReconcileError::from(LedgerError::Connection("reset".into())).is_transient());
        assert!(!ReconcileError::from(LedgerError::Query("bad".into())).is_transient());
        assert!(ReconcileError::from(ChainError::Disconnected("ws".into())).is_transient());
        assert!(!ReconcileError::from(ChainError::Rejected("nonce".into())).is_transient());
        assert!(!ReconcileError::Shutdown.is_transient());
    }

    #[test]
    fn test_conflicts() {
        let err = ReconcileError::NoActiveOffer {
            collection_id: 3,
            token_id: 18,
        };
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "no active offer for token 3/18");
        assert!(!ReconcileError::CallFailed("x".into()).is_conflict());
    }
}
