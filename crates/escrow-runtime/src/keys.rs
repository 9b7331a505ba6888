//! # Admin Keys
//!
//! Derives the pool's signing identities from the configured seeds. A seed
//! is 32 bytes of hex; the identity's account is its ed25519 public key.

use ed25519_dalek::SigningKey;
use esc_01_key_pool::{AdminIdentity, KeyPool, SecretSeed};
use shared_types::{AccountId, AuthGroup, CollectionId};
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::config::EscrowConfig;

/// Seed decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Not hex.
    #[error("seed {label} is not hex")]
    NotHex {
        /// Identity label.
        label: String,
    },

    /// Wrong length.
    #[error("seed {label} must be 32 bytes, got {len}")]
    BadLength {
        /// Identity label.
        label: String,
        /// Decoded length.
        len: usize,
    },

    /// Collection key is not a number.
    #[error("collection id `{0}` is not a number")]
    BadCollection(String),
}

/// The primary admin and its scoped secondaries.
pub struct AdminKeys {
    primary: AdminIdentity,
    secondaries: Vec<(AdminIdentity, AuthGroup)>,
}

impl AdminKeys {
    /// Derive every identity named in `config`.
    pub fn from_config(config: &EscrowConfig) -> Result<Self, KeyError> {
        let primary = derive("admin", &config.admin_seed)?;

        let mut secondaries = Vec::with_capacity(config.other_admins.len());
        for (i, seed) in config.other_admins.contract.iter().enumerate() {
            let identity = derive(&format!("contract-admin-{i}"), seed)?;
            secondaries.push((identity, AuthGroup::Contract));
        }
        for (collection, seeds) in &config.other_admins.collection {
            let collection_id: CollectionId = collection
                .parse()
                .map_err(|_| KeyError::BadCollection(collection.clone()))?;
            for (i, seed) in seeds.iter().enumerate() {
                let identity = derive(&format!("collection-{collection_id}-admin-{i}"), seed)?;
                secondaries.push((identity, AuthGroup::Collection(collection_id)));
            }
        }

        info!(
            "[esc-01] Escrow admin {} with {} secondary key(s)",
            primary.account(),
            secondaries.len()
        );
        Ok(Self {
            primary,
            secondaries,
        })
    }

    /// Escrow admin account; tokens deposited here are escrowed.
    pub fn escrow_admin(&self) -> AccountId {
        self.primary.account()
    }

    /// Number of secondary identities.
    pub fn secondary_count(&self) -> usize {
        self.secondaries.len()
    }

    /// Build the key pool.
    pub fn into_pool(self) -> KeyPool {
        KeyPool::new(self.primary, self.secondaries)
    }
}

fn derive(label: &str, seed_hex: &str) -> Result<AdminIdentity, KeyError> {
    let trimmed = seed_hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = Zeroizing::new(hex::decode(digits).map_err(|_| KeyError::NotHex {
        label: label.to_string(),
    })?);
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::BadLength {
            label: label.to_string(),
            len: bytes.len(),
        })?;
    let seed = SecretSeed::new(seed);
    let account = AccountId::new(SigningKey::from_bytes(seed.expose()).verifying_key().to_bytes());
    Ok(AdminIdentity::new(label, account, seed))
}
