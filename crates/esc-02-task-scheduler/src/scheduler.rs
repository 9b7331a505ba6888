//! # Task Scheduler
//!
//! Admits async units of work up to a fixed concurrency cap.
//!
//! `submit` waits only for a free slot, never for the unit itself. A slot is
//! returned when the unit's future finishes or unwinds, so a failing unit
//! cannot wedge admission.
//!
//! `reserve` splits admission in two: the caller takes a slot first, does its
//! bookkeeping, then spawns the unit on the [`Reservation`]. Nothing is
//! written for a unit that was never admitted.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::errors::SchedulerError;
use crate::stop::StopSignal;

/// Default concurrency cap.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Bounded scheduler over the tokio runtime.
#[derive(Clone, Debug)]
pub struct TaskScheduler {
    limit: usize,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    // Serializes drains; a reopen must not land between another drain's
    // close and wait.
    draining: Arc<Mutex<()>>,
    stop: StopSignal,
}

impl TaskScheduler {
    /// Scheduler admitting at most `limit` units at once. A zero limit is
    /// raised to one.
    pub fn new(limit: usize, stop: StopSignal) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            slots: Arc::new(Semaphore::new(limit)),
            tracker: TaskTracker::new(),
            draining: Arc::new(Mutex::new(())),
            stop,
        }
    }

    /// Scheduler with [`DEFAULT_CONCURRENCY`].
    pub fn with_default_limit(stop: StopSignal) -> Self {
        Self::new(DEFAULT_CONCURRENCY, stop)
    }

    /// Admit `unit`, waiting while the cap is reached.
    ///
    /// # Errors
    /// `Stopped` if the stop signal fired before or while waiting for a slot.
    pub async fn submit<F>(&self, unit: F) -> Result<(), SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reserve().await?.spawn(unit);
        Ok(())
    }

    /// Take a slot without a unit yet, waiting while the cap is reached.
    /// Dropping the reservation returns the slot.
    ///
    /// # Errors
    /// `Stopped` if the stop signal fired before or while waiting for a slot.
    pub async fn reserve(&self) -> Result<Reservation, SchedulerError> {
        if self.stop.is_stopped() {
            return Err(SchedulerError::Stopped);
        }

        let slot = tokio::select! {
            biased;
            _ = self.stop.stopped() => return Err(SchedulerError::Stopped),
            slot = Arc::clone(&self.slots).acquire_owned() => {
                // The semaphore is never closed.
                slot.map_err(|_| SchedulerError::Stopped)?
            }
        };

        Ok(Reservation {
            slot,
            tracker: self.tracker.clone(),
        })
    }

    /// Wait until every admitted unit has finished.
    pub async fn drain(&self) {
        let _guard = self.draining.lock().await;
        debug!("[esc-02] Draining {} in-flight units", self.in_flight());
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Number of admitted units that have not finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Concurrency cap.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Stop signal observed by this scheduler.
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}

/// A scheduler slot held ahead of its unit.
#[derive(Debug)]
pub struct Reservation {
    slot: OwnedSemaphorePermit,
    tracker: TaskTracker,
}

impl Reservation {
    /// Spawn `unit` on the reserved slot.
    pub fn spawn<F>(self, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { slot, tracker } = self;
        trace!("[esc-02] Unit admitted ({} in flight)", tracker.len() + 1);
        tracker.spawn(async move {
            let _slot = slot;
            unit.await;
        });
    }
}
