//! # Admin Identities
//!
//! A pre-provisioned signing identity: its public account plus the secret
//! seed the gateway signs with. Seed bytes are wiped on drop.

use std::fmt;

use shared_types::AccountId;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 32-byte signing seed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretSeed([u8; 32]);

impl SecretSeed {
    /// Wrap raw seed bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the seed for signing.
    pub fn expose(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretSeed(**redacted**)")
    }
}

/// An admin signing identity.
#[derive(Clone)]
pub struct AdminIdentity {
    label: String,
    account: AccountId,
    seed: SecretSeed,
}

impl AdminIdentity {
    /// Create an identity from its derived account and seed.
    pub fn new(label: impl Into<String>, account: AccountId, seed: SecretSeed) -> Self {
        Self {
            label: label.into(),
            account,
            seed,
        }
    }

    /// Human readable label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Public account of the identity.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Signing seed.
    pub fn seed(&self) -> &SecretSeed {
        &self.seed
    }
}

impl fmt::Debug for AdminIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminIdentity")
            .field("label", &self.label)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_seed() {
        let identity = AdminIdentity::new("alice", AccountId::new([1; 32]), SecretSeed::new([9; 32]));
        let printed = format!("{identity:?}");
        assert!(printed.contains("alice"));
        assert!(!printed.contains("9, 9"));
        assert_eq!(format!("{:?}", identity.seed()), "SecretSeed(**redacted**)");
    }
}
