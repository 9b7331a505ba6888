//! # Stop Signal
//!
//! Process-wide shutdown flag. Only the shutdown path triggers it, and it
//! fires at most once; every loop and the scheduler observe it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cloneable handle to the shared stop flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    /// Fresh, untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` only for the call that actually fired.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!("[esc-02] Stop requested");
        self.token.cancel();
        true
    }

    /// Whether shutdown was requested.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once shutdown is requested.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Underlying token, for `select!` arms in other crates.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
