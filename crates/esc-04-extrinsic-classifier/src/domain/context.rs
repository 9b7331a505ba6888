//! Addresses the classifier matches against.

use shared_types::AccountId;

/// Escrow and matcher addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierContext {
    /// Primary escrow admin; token transfers to it are deposits.
    pub escrow_admin: AccountId,
    /// Matcher contract address.
    pub matcher: AccountId,
}

impl ClassifierContext {
    /// Context for the given addresses.
    pub fn new(escrow_admin: AccountId, matcher: AccountId) -> Self {
        Self {
            escrow_admin,
            matcher,
        }
    }
}
