//! # Ledger Configuration

use serde::{Deserialize, Serialize};

/// Database connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    #[serde(skip_serializing)]
    pub password: String,
    /// Pool size. Should cover the scheduler's concurrency limit.
    pub max_connections: u32,
    /// How long a unit waits for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "marketplace".to_string(),
            user: "marketplace".to_string(),
            password: String::new(),
            max_connections: 24,
            acquire_timeout_secs: 30,
        }
    }
}

impl LedgerConfig {
    /// Small pool against a local database.
    pub fn for_testing() -> Self {
        Self {
            database: "marketplace_test".to_string(),
            max_connections: 4,
            acquire_timeout_secs: 2,
            ..Default::default()
        }
    }

    /// `host:port/database` for logs; never includes the password.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}
