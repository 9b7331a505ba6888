//! # Marketplace Escrow
//!
//! Keeps the marketplace ledger in step with the matcher contract and moves
//! escrowed tokens when trades settle.

use anyhow::{Context, Result};
use tracing::{error, info};

use escrow_runtime::{init_logging, EscrowConfig, EscrowRuntime, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let config = EscrowConfig::from_env().context("loading configuration")?;
    init_logging(&config.log)?;
    config.validate().context("validating configuration")?;

    info!("===========================================");
    info!("  Marketplace Escrow v{}", VERSION);
    info!("===========================================");
    info!("Chain: {}", config.chain.endpoint);
    info!("Ledger: {}", config.ledger.display_target());
    info!(
        "Start block: {}, concurrency: {}, recovery: {:?}",
        config.engine.start_block, config.max_concurrency, config.engine.recovery
    );

    let runtime = EscrowRuntime::connect(&config).await?;
    let mut worker = {
        let runtime = runtime.clone();
        tokio::spawn(async move { runtime.run().await })
    };

    tokio::select! {
        joined = &mut worker => {
            let result = joined.context("engine task panicked")?;
            if let Err(e) = &result {
                error!("Escrow stopped: {:#}", e);
            }
            return result;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            info!("Stop requested, draining in-flight work");
            runtime.stop();
        }
    }

    worker.await.context("engine task panicked")??;
    info!("Shutdown complete");
    Ok(())
}
