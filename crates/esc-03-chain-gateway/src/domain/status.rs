//! # Call Status Tracking
//!
//! A submitted call reports a stream of statuses. They collapse into three
//! states:
//!
//! ```text
//! Ready | Broadcast              -> NotReady   (signer no longer needed)
//! InBlock | Finalized + success  -> Success
//! InBlock | Finalized otherwise  -> Failed
//! Dropped | Invalid | Usurped    -> Failed
//! ```

use serde::{Deserialize, Serialize};
use shared_types::{ChainEvent, EventRecord};

/// Raw status reported by the node for a submitted call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallStatus {
    /// Accepted into the pool.
    Ready,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a block; `events` are the call's own events.
    InBlock {
        /// Events emitted by the call.
        #[serde(default)]
        events: Vec<EventRecord>,
    },
    /// Included in a finalized block.
    Finalized {
        /// Events emitted by the call.
        #[serde(default)]
        events: Vec<EventRecord>,
    },
    /// Dropped from the pool.
    Dropped,
    /// Deemed invalid.
    Invalid,
    /// Replaced by another call with the same nonce.
    Usurped,
}

/// Collapsed call state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallProgress {
    /// Still on its way; the signer may be released.
    NotReady,
    /// Terminal success.
    Success(Vec<EventRecord>),
    /// Terminal failure.
    Failed(Vec<EventRecord>),
}

/// Terminal result of a submitted call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call dispatched successfully.
    Success(Vec<EventRecord>),
    /// The call was included but failed, or never made it in.
    Failed(Vec<EventRecord>),
}

impl CallOutcome {
    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Events attached to the outcome.
    pub fn events(&self) -> &[EventRecord] {
        match self {
            CallOutcome::Success(events) | CallOutcome::Failed(events) => events,
        }
    }
}

/// Map a raw status to its collapsed state.
pub fn evaluate(status: CallStatus) -> CallProgress {
    match status {
        CallStatus::Ready | CallStatus::Broadcast => CallProgress::NotReady,
        CallStatus::InBlock { events } | CallStatus::Finalized { events } => {
            let failed = events
                .iter()
                .any(|record| record.event == ChainEvent::ExtrinsicFailed);
            let succeeded = events
                .iter()
                .any(|record| record.event == ChainEvent::ExtrinsicSuccess);
            if !failed && succeeded {
                CallProgress::Success(events)
            } else {
                CallProgress::Failed(events)
            }
        }
        CallStatus::Dropped | CallStatus::Invalid | CallStatus::Usurped => {
            CallProgress::Failed(Vec::new())
        }
    }
}

impl CallStatus {
    /// Whether no further status will follow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Ready | CallStatus::Broadcast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Phase;

    fn record(event: ChainEvent) -> EventRecord {
        EventRecord {
            phase: Phase::ApplyExtrinsic(1),
            event,
        }
    }

    #[test]
    fn test_pool_statuses_are_not_ready() {
        assert_eq!(evaluate(CallStatus::Ready), CallProgress::NotReady);
        assert_eq!(evaluate(CallStatus::Broadcast), CallProgress::NotReady);
    }

    #[test]
    fn test_in_block_success() {
        let events = vec![record(ChainEvent::ExtrinsicSuccess)];
        assert_eq!(
            evaluate(CallStatus::InBlock {
                events: events.clone()
            }),
            CallProgress::Success(events)
        );
    }

    #[test]
    fn test_failure_marker_wins() {
        let events = vec![
            record(ChainEvent::ExtrinsicSuccess),
            record(ChainEvent::ExtrinsicFailed),
        ];
        assert!(matches!(
            evaluate(CallStatus::Finalized { events }),
            CallProgress::Failed(_)
        ));
    }

    #[test]
    fn test_included_without_marker_is_failure() {
        assert_eq!(
            evaluate(CallStatus::InBlock { events: vec![] }),
            CallProgress::Failed(vec![])
        );
    }

    #[test]
    fn test_dropped_is_failure() {
        assert_eq!(evaluate(CallStatus::Dropped), CallProgress::Failed(vec![]));
        assert!(CallStatus::Usurped.is_terminal());
        assert!(!CallStatus::Broadcast.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let status: CallStatus = serde_json::from_str(r#"{"status":"broadcast"}"#).unwrap();
        assert_eq!(status, CallStatus::Broadcast);
        let status: CallStatus =
            serde_json::from_str(r#"{"status":"in_block","events":[]}"#).unwrap();
        assert_eq!(status, CallStatus::InBlock { events: vec![] });
    }
}
