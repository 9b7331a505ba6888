//! # Domain Module
//!
//! Actions, errors and matching context of the classifier.

pub mod action;
pub mod context;
pub mod errors;

pub use action::EscrowAction;
pub use context::ClassifierContext;
pub use errors::ClassifyError;
