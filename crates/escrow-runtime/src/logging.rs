//! # Logging
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` from the
//! configured directive, then either human-readable or JSON lines.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Install the subscriber. Fails if the filter does not parse or a global
/// subscriber is already set.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;

    if config.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_rejected() {
        let config = LogConfig {
            filter: "esc=[".to_string(),
            json: false,
        };
        assert!(init_logging(&config).is_err());
    }
}
