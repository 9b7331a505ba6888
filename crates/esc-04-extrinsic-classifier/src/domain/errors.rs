//! Classifier errors.

use thiserror::Error;

/// A call matched an escrow signature but cannot be turned into an action.
///
/// Always a protocol violation: the block is final, so retrying cannot help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// A settlement event the call kind requires is absent.
    #[error("{call} call at index {index} has no {event} event")]
    MissingEvent {
        /// Call kind.
        call: &'static str,
        /// Missing event identifier.
        event: &'static str,
        /// Extrinsic index.
        index: u32,
    },

    /// Listing payload shorter than its fixed layout.
    #[error("malformed listing payload: {0}")]
    MalformedPayload(String),

    /// Unsigned extrinsic where the signer is the acting party.
    #[error("extrinsic at index {0} is unsigned")]
    MissingSigner(u32),
}
