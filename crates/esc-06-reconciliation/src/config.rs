//! # Engine Configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::{BlockNumber, QuoteId};

use crate::domain::ReconcileError;

/// Where catch-up starts when no block has been recorded yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartBlock {
    /// The chain head at startup.
    #[default]
    Current,
    /// An explicit block.
    Number(BlockNumber),
}

impl FromStr for StartBlock {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("current") || s.is_empty() {
            return Ok(StartBlock::Current);
        }
        s.parse()
            .map(StartBlock::Number)
            .map_err(|_| ReconcileError::InvalidConfig(format!("start block `{s}`")))
    }
}

impl fmt::Display for StartBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartBlock::Current => write!(f, "current"),
            StartBlock::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Stuck-token recovery mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMode {
    /// Do not run.
    #[default]
    Off,
    /// Log what would be applied.
    DryRun,
    /// Apply missed settlements.
    Apply,
}

impl FromStr for RecoveryMode {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "false" => Ok(RecoveryMode::Off),
            "dry-run" | "dryrun" => Ok(RecoveryMode::DryRun),
            "apply" | "true" => Ok(RecoveryMode::Apply),
            other => Err(ReconcileError::InvalidConfig(format!(
                "recovery mode `{other}`"
            ))),
        }
    }
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wait between loop iterations when caught up; cut short by a new head.
    pub poll_interval_ms: u64,
    /// Delay before retrying a transient ledger failure.
    pub retry_delay_ms: u64,
    /// Delay after a failed deposit registration before the unit exits.
    pub registration_retry_ms: u64,
    /// Rows fetched per sweep batch.
    pub sweep_batch: usize,
    /// Quote currency whose deposits the quote sweep registers.
    pub quote_id: QuoteId,
    /// Whitelist quote depositors before registering their deposit.
    pub whitelist: bool,
    /// Catch-up start when the watermark table is empty.
    pub start_block: StartBlock,
    /// Startup stuck-token recovery.
    pub recovery: RecoveryMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 6_000,
            retry_delay_ms: 6_000,
            registration_retry_ms: 6_000,
            sweep_batch: 100,
            quote_id: 2,
            whitelist: false,
            start_block: StartBlock::Current,
            recovery: RecoveryMode::Off,
        }
    }
}

impl EngineConfig {
    /// Short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            poll_interval_ms: 50,
            retry_delay_ms: 10,
            registration_retry_ms: 10,
            start_block: StartBlock::Number(1),
            ..Default::default()
        }
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry delay.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Registration retry delay.
    pub fn registration_retry(&self) -> Duration {
        Duration::from_millis(self.registration_retry_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_block_parsing() {
        assert_eq!("current".parse::<StartBlock>().unwrap(), StartBlock::Current);
        assert_eq!("".parse::<StartBlock>().unwrap(), StartBlock::Current);
        assert_eq!("1200".parse::<StartBlock>().unwrap(), StartBlock::Number(1200));
        assert!("latest".parse::<StartBlock>().is_err());
        assert_eq!(StartBlock::Number(5).to_string(), "5");
    }

    #[test]
    fn test_recovery_mode_parsing() {
        assert_eq!("off".parse::<RecoveryMode>().unwrap(), RecoveryMode::Off);
        assert_eq!("Dry-Run".parse::<RecoveryMode>().unwrap(), RecoveryMode::DryRun);
        assert_eq!("apply".parse::<RecoveryMode>().unwrap(), RecoveryMode::Apply);
        assert!(matches!(
            "sometimes".parse::<RecoveryMode>(),
            Err(ReconcileError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(6));
        assert_eq!(config.sweep_batch, 100);
        assert_eq!(config.quote_id, 2);
        assert!(!config.whitelist);
    }
}
