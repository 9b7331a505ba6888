//! # Engine State
//!
//! Process-wide mutable state shared by the catch-up loop, its units and the
//! head subscription.
//!
//! Single-writer rules:
//! - `best_block` moves only through [`EngineState::observe_head`], which the
//!   head subscription calls, and which the loop calls once at startup.
//! - `next_block` is advanced only by the catch-up loop.
//! - `claims` entries are added by a sweep and removed by the unit it spawned.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::BlockNumber;
use tokio::sync::Notify;
use uuid::Uuid;

/// Shared engine state.
#[derive(Debug, Default)]
pub struct EngineState {
    best_block: AtomicU64,
    next_block: AtomicU64,
    wake: Notify,
    claims: Mutex<HashSet<Uuid>>,
}

impl EngineState {
    /// Fresh state: no head seen, cursor at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new chain head and wake the loop. Heads never move backwards.
    pub fn observe_head(&self, head: BlockNumber) {
        let previous = self.best_block.fetch_max(head, Ordering::AcqRel);
        if head > previous {
            self.wake.notify_one();
        }
    }

    /// Highest head seen.
    pub fn best_block(&self) -> BlockNumber {
        self.best_block.load(Ordering::Acquire)
    }

    /// Next block the catch-up loop will record.
    pub fn next_block(&self) -> BlockNumber {
        self.next_block.load(Ordering::Acquire)
    }

    pub(crate) fn set_next_block(&self, block: BlockNumber) {
        self.next_block.store(block, Ordering::Release);
    }

    /// Wait for the next head notification.
    pub async fn woken(&self) {
        self.wake.notified().await;
    }

    /// Claim a queued deposit row for one registration unit. False if a unit
    /// already holds it.
    pub fn claim(self: &Arc<Self>, id: Uuid) -> Option<DepositClaim> {
        if !self.claims.lock().insert(id) {
            return None;
        }
        Some(DepositClaim {
            state: Arc::clone(self),
            id,
        })
    }

    /// Whether a unit holds the row.
    pub fn is_claimed(&self, id: &Uuid) -> bool {
        self.claims.lock().contains(id)
    }

    /// Number of rows held by in-flight units.
    pub fn claimed(&self) -> usize {
        self.claims.lock().len()
    }
}

/// A row held by an in-flight registration unit; released on drop.
#[derive(Debug)]
pub struct DepositClaim {
    state: Arc<EngineState>,
    id: Uuid,
}

impl DepositClaim {
    /// Claimed row.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for DepositClaim {
    fn drop(&mut self) {
        self.state.claims.lock().remove(&self.id);
    }
}
