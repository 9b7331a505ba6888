//! # ESC-02 Bounded Task Scheduler
//!
//! Runs reconciliation units with a fixed concurrency cap and owns the
//! process-wide stop signal.
//!
//! **Subsystem ID:** 2
//!
//! ## Contract
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | `submit` | Waits for a slot, spawns the unit, returns |
//! | `drain` | Waits until no unit is in flight |
//! | `StopSignal::trigger` | Fires once; later `submit`s are rejected |
//!
//! In-flight units are never aborted. Shutdown triggers the signal, then drains.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod scheduler;
pub mod stop;

// Re-exports
pub use errors::SchedulerError;
pub use scheduler::{Reservation, TaskScheduler, DEFAULT_CONCURRENCY};
pub use stop::StopSignal;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
