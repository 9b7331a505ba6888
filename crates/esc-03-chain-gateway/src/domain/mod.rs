//! # Domain Module
//!
//! Gateway errors, query results and the call status state machine.

pub mod entities;
pub mod errors;
pub mod status;

pub use entities::{CollectionInfo, HeadInfo, SubmissionId};
pub use errors::ChainError;
pub use status::{evaluate, CallOutcome, CallProgress, CallStatus};
