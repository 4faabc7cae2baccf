//! Maker Vault Liquidation Snapshot
//!
//! Reads every vault from the DSS contracts at one block and prints, for each
//! vault with collateral and debt, the collateral price at which it becomes
//! liquidatable.
//!
//! Usage: `maker-liquidations [--with-metadata]`
//!
//! Configuration comes from the TOML file named by `SNAPSHOT_CONFIG`, or
//! from mainnet defaults with the RPC endpoint in `ETH_RPC_URL`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidations_chain::Multicall3Transport;
use liquidations_core::{LiquidationSnapshotter, SnapshotConfig};

/// Environment variable names.
mod env {
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

const WITH_METADATA_FLAG: &str = "--with-metadata";

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    let with_metadata = std::env::args().skip(1).any(|arg| arg == WITH_METADATA_FLAG);

    // Load snapshot config (SNAPSHOT_CONFIG path or mainnet defaults)
    let config = SnapshotConfig::from_env().context("Failed to load snapshot config")?;
    config.log_config();

    let contracts = config.contracts.dss()?;
    let multicall = config.contracts.multicall()?;

    // Transport
    let transport = Multicall3Transport::connect(&config.chain.rpc_url, multicall, config.chain.chain_id)
        .await
        .context("Failed to connect to RPC")?
        .with_max_calls_per_batch(config.batch.max_calls_per_batch)
        .with_max_concurrent_batches(config.batch.max_concurrent_batches);

    let snapshotter = LiquidationSnapshotter::new(Arc::new(transport), contracts, config.chain.name.clone());

    info!("Taking liquidation snapshot...");
    let snapshot = snapshotter.take_snapshot().await?;
    info!(
        block = snapshot.block,
        positions = snapshot.positions.len(),
        "Snapshot taken"
    );

    let output = if with_metadata {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot.positions)?
    };
    println!("{}", output);

    Ok(())
}

/// Registry with env filter; `LOG_FORMAT=json` switches to JSON lines.
///
/// Logs go to stderr so stdout carries only the snapshot.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,liquidations_core=debug,liquidations_chain=debug"));

    let json = std::env::var(env::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

/// Print startup banner.
fn print_banner() {
    eprintln!(r#"
    ╔╦╗┌─┐┬┌─┌─┐┬─┐  ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┬┌─┐┌┐┌┌─┐
    ║║║├─┤├┴┐├┤ ├┬┘  ║  ││─┼┐│ ││ ││├─┤ │ ││ ││││└─┐
    ╩ ╩┴ ┴┴ ┴└─┘┴└─  ╩═╝┴└─┘└└─┘┴─┴┘┴ ┴ ┴ ┴└─┘┘└┘└─┘
    Vault Snapshot v0.1.0
    "#);
}
