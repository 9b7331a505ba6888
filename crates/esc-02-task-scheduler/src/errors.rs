//! Scheduler errors.

use thiserror::Error;

/// Why a unit was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The stop signal fired; no new work is admitted.
    #[error("scheduler stopped, unit rejected")]
    Stopped,
}
