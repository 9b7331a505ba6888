//! # Runtime Configuration
//!
//! Everything the escrow needs at startup, read from environment variables.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `wsEndpoint` / `ESCROW_CHAIN_ENDPOINT` | chain node endpoint | `http://127.0.0.1:9933` |
//! | `ADMIN_SEED` | primary admin seed, 32 bytes hex | required |
//! | `OTHER_ADMINS_SEEDS` | `{"contract": [..], "collection": {"<id>": [..]}}` | none |
//! | `MatcherContractAddress` | matcher contract account, hex | required |
//! | `DB_HOST` `DB_PORT` `DB_NAME` `DB_USER` `DB_PASSWORD` | ledger database | localhost |
//! | `START_FROM_BLOCK` | `current` or a block number | `current` |
//! | `QUOTE_ID` | quote currency swept for deposits | `2` |
//! | `WHITELIST` | whitelist quote depositors | `false` |
//! | `MAX_CONCURRENCY` | scheduler cap | `20` |
//! | `POLL_INTERVAL_SECS` | loop poll interval | `6` |
//! | `RECOVER_STUCK_TOKENS` | `off`, `dry-run` or `apply` | `off` |
//! | `ESCROW_LOG_LEVEL` / `RUST_LOG` | log filter | `info` |
//! | `ESCROW_JSON_LOGS` | JSON log lines | `false` |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use esc_02_task_scheduler::DEFAULT_CONCURRENCY;
use esc_03_chain_gateway::GatewayConfig;
use esc_05_ledger_store::LedgerConfig;
use esc_06_reconciliation::{EngineConfig, RecoveryMode, StartBlock};
use serde::Deserialize;
use shared_types::AccountId;
use thiserror::Error;
use zeroize::Zeroizing;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("{var} is invalid: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Parse failure.
        reason: String,
    },
}

/// Secondary admin seeds, as given in `OTHER_ADMINS_SEEDS`.
#[derive(Clone, Default, Deserialize)]
pub struct OtherAdmins {
    /// Seeds allowed to sign matcher calls.
    #[serde(default)]
    pub contract: Vec<Zeroizing<String>>,
    /// Seeds allowed to sign transfers, per collection id.
    #[serde(default)]
    pub collection: BTreeMap<String, Vec<Zeroizing<String>>>,
}

impl OtherAdmins {
    /// Number of secondary seeds.
    pub fn len(&self) -> usize {
        self.contract.len() + self.collection.values().map(Vec::len).sum::<usize>()
    }

    /// True when no secondary seed is configured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for OtherAdmins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let collections: BTreeMap<&str, usize> = self
            .collection
            .iter()
            .map(|(id, seeds)| (id.as_str(), seeds.len()))
            .collect();
        f.debug_struct("OtherAdmins")
            .field("contract", &self.contract.len())
            .field("collection", &collections)
            .finish()
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive.
    pub filter: String,
    /// Emit JSON lines.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Complete runtime configuration.
#[derive(Clone)]
pub struct EscrowConfig {
    /// Chain node connection.
    pub chain: GatewayConfig,
    /// Ledger database.
    pub ledger: LedgerConfig,
    /// Engine behavior.
    pub engine: EngineConfig,
    /// Primary admin seed (hex).
    pub admin_seed: Zeroizing<String>,
    /// Secondary admin seeds.
    pub other_admins: OtherAdmins,
    /// Matcher contract address (hex).
    pub matcher_address: String,
    /// Scheduler concurrency cap.
    pub max_concurrency: usize,
    /// Logging.
    pub log: LogConfig,
}

impl fmt::Debug for EscrowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscrowConfig")
            .field("chain", &self.chain)
            .field("ledger", &self.ledger.display_target())
            .field("engine", &self.engine)
            .field("admin_seed", &"**redacted**")
            .field("other_admins", &self.other_admins)
            .field("matcher_address", &self.matcher_address)
            .field("max_concurrency", &self.max_concurrency)
            .field("log", &self.log)
            .finish()
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            chain: GatewayConfig::default(),
            ledger: LedgerConfig::default(),
            engine: EngineConfig::default(),
            admin_seed: Zeroizing::new(String::new()),
            other_admins: OtherAdmins::default(),
            matcher_address: String::new(),
            max_concurrency: DEFAULT_CONCURRENCY,
            log: LogConfig::default(),
        }
    }
}

impl EscrowConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(endpoint) = get("wsEndpoint").or_else(|| get("ESCROW_CHAIN_ENDPOINT")) {
            config.chain.endpoint = endpoint;
        }

        if let Some(seed) = get("ADMIN_SEED") {
            config.admin_seed = Zeroizing::new(seed);
        }
        if let Some(json) = get("OTHER_ADMINS_SEEDS").map(Zeroizing::new) {
            config.other_admins =
                serde_json::from_str(&json).map_err(|e| ConfigError::Invalid {
                    var: "OTHER_ADMINS_SEEDS",
                    reason: e.to_string(),
                })?;
        }
        if let Some(matcher) = get("MatcherContractAddress") {
            config.matcher_address = matcher;
        }

        if let Some(host) = get("DB_HOST") {
            config.ledger.host = host;
        }
        if let Some(port) = get("DB_PORT") {
            config.ledger.port = parse("DB_PORT", &port)?;
        }
        if let Some(database) = get("DB_NAME") {
            config.ledger.database = database;
        }
        if let Some(user) = get("DB_USER") {
            config.ledger.user = user;
        }
        if let Some(password) = get("DB_PASSWORD") {
            config.ledger.password = password;
        }

        if let Some(start) = get("START_FROM_BLOCK") {
            config.engine.start_block = StartBlock::from_str(&start).map_err(|e| {
                ConfigError::Invalid {
                    var: "START_FROM_BLOCK",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(quote_id) = get("QUOTE_ID") {
            config.engine.quote_id = parse("QUOTE_ID", &quote_id)?;
        }
        if let Some(whitelist) = get("WHITELIST") {
            config.engine.whitelist = parse_flag("WHITELIST", &whitelist)?;
        }
        if let Some(poll) = get("POLL_INTERVAL_SECS") {
            let secs: u64 = parse("POLL_INTERVAL_SECS", &poll)?;
            config.engine.poll_interval_ms = secs.saturating_mul(1_000);
        }
        if let Some(recovery) = get("RECOVER_STUCK_TOKENS") {
            config.engine.recovery = RecoveryMode::from_str(&recovery).map_err(|e| {
                ConfigError::Invalid {
                    var: "RECOVER_STUCK_TOKENS",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(limit) = get("MAX_CONCURRENCY") {
            config.max_concurrency = parse("MAX_CONCURRENCY", &limit)?;
        }

        if let Some(filter) = get("ESCROW_LOG_LEVEL").or_else(|| get("RUST_LOG")) {
            config.log.filter = filter;
        }
        if let Some(json) = get("ESCROW_JSON_LOGS") {
            config.log.json = parse_flag("ESCROW_JSON_LOGS", &json)?;
        }

        Ok(config)
    }

    /// Reject configurations the runtime cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_seed.is_empty() {
            return Err(ConfigError::Missing("ADMIN_SEED"));
        }
        if self.matcher_address.is_empty() {
            return Err(ConfigError::Missing("MatcherContractAddress"));
        }
        self.matcher()?;
        if self.chain.endpoint.is_empty() {
            return Err(ConfigError::Missing("wsEndpoint"));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_CONCURRENCY",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.engine.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        for id in self.other_admins.collection.keys() {
            parse::<u64>("OTHER_ADMINS_SEEDS", id)?;
        }
        Ok(())
    }

    /// Matcher contract account.
    pub fn matcher(&self) -> Result<AccountId, ConfigError> {
        AccountId::from_hex(&self.matcher_address).map_err(|e| ConfigError::Invalid {
            var: "MatcherContractAddress",
            reason: e.to_string(),
        })
    }

    /// Valid configuration with fixed test seeds and short delays.
    pub fn for_testing() -> Self {
        Self {
            chain: GatewayConfig::for_testing(),
            ledger: LedgerConfig::for_testing(),
            engine: EngineConfig::for_testing(),
            admin_seed: Zeroizing::new(hex::encode([0x11u8; 32])),
            matcher_address: hex::encode([0x4Du8; 32]),
            ..Self::default()
        }
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("`{other}` is not a boolean"),
        }),
    }
}
