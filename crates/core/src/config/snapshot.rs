//! Snapshot configuration: chain, contract addresses, batching.
//!
//! Loaded from a TOML file named by `SNAPSHOT_CONFIG`, or built from
//! defaults (Maker mainnet deployment, RPC from `ETH_RPC_URL`).
//!
//! ```toml
//! [chain]
//! name = "ethereum"
//! chain_id = 1
//! rpc_url = "${ETH_RPC_URL}"
//!
//! [contracts]
//! cdp_manager = "0x5ef30b9986345249bc32d8928B7ee64DE9435E39"
//!
//! [batch]
//! max_calls_per_batch = 500
//! max_concurrent_batches = 4
//! ```

use std::path::Path;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use liquidations_chain::{
    DssContracts, DEFAULT_MAX_CALLS_PER_BATCH, DEFAULT_MAX_CONCURRENT_BATCHES, MULTICALL3_ADDRESS,
};
use serde::{Deserialize, Serialize};

use super::chain::ChainConfig;

/// Env var holding the config file path.
pub const CONFIG_PATH_ENV: &str = "SNAPSHOT_CONFIG";

/// Full snapshot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub contracts: ContractsConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Contract addresses as hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_cdp_manager")]
    pub cdp_manager: String,
    #[serde(default = "default_ilk_registry")]
    pub ilk_registry: String,
    #[serde(default = "default_vat")]
    pub vat: String,
    #[serde(default = "default_spotter")]
    pub spotter: String,
    #[serde(default = "default_multicall")]
    pub multicall: String,
}

fn default_cdp_manager() -> String {
    DssContracts::mainnet().cdp_manager.to_checksum(None)
}
fn default_ilk_registry() -> String {
    DssContracts::mainnet().ilk_registry.to_checksum(None)
}
fn default_vat() -> String {
    DssContracts::mainnet().vat.to_checksum(None)
}
fn default_spotter() -> String {
    DssContracts::mainnet().spotter.to_checksum(None)
}
fn default_multicall() -> String {
    MULTICALL3_ADDRESS.to_checksum(None)
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            cdp_manager: default_cdp_manager(),
            ilk_registry: default_ilk_registry(),
            vat: default_vat(),
            spotter: default_spotter(),
            multicall: default_multicall(),
        }
    }
}

impl ContractsConfig {
    /// Parse the DSS addresses.
    pub fn dss(&self) -> Result<DssContracts> {
        Ok(DssContracts {
            cdp_manager: parse_address("cdp_manager", &self.cdp_manager)?,
            ilk_registry: parse_address("ilk_registry", &self.ilk_registry)?,
            vat: parse_address("vat", &self.vat)?,
            spotter: parse_address("spotter", &self.spotter)?,
        })
    }

    /// Parse the Multicall3 address.
    pub fn multicall(&self) -> Result<Address> {
        parse_address("multicall", &self.multicall)
    }
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid address for contracts.{}: {}", name, value))
}

/// Multicall chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Calls per `aggregate3` request
    #[serde(default = "default_max_calls_per_batch")]
    pub max_calls_per_batch: usize,
    /// `aggregate3` requests in flight per logical batch
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
}

fn default_max_calls_per_batch() -> usize {
    DEFAULT_MAX_CALLS_PER_BATCH
}
fn default_max_concurrent_batches() -> usize {
    DEFAULT_MAX_CONCURRENT_BATCHES
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_calls_per_batch: default_max_calls_per_batch(),
            max_concurrent_batches: default_max_concurrent_batches(),
        }
    }
}

impl SnapshotConfig {
    /// Load config from a TOML file, expanding `${VAR}` values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse config from TOML text, expanding `${VAR}` values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.chain.expand_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Config file from `SNAPSHOT_CONFIG` if set, mainnet defaults otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                let mut config = Self::default();
                config.chain.expand_env_vars();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Check values the TOML schema cannot.
    pub fn validate(&self) -> Result<()> {
        if self.chain.has_unresolved_rpc() {
            bail!("chain.rpc_url references an unset variable: {}", self.chain.rpc_url);
        }
        if self.batch.max_calls_per_batch == 0 {
            bail!("batch.max_calls_per_batch must be at least 1");
        }
        if self.batch.max_concurrent_batches == 0 {
            bail!("batch.max_concurrent_batches must be at least 1");
        }
        self.contracts.dss()?;
        self.contracts.multicall()?;
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            chain = %self.chain.name,
            chain_id = self.chain.chain_id,
            "Snapshot configuration loaded"
        );
        tracing::info!(
            cdp_manager = %self.contracts.cdp_manager,
            ilk_registry = %self.contracts.ilk_registry,
            vat = %self.contracts.vat,
            spotter = %self.contracts.spotter,
            multicall = %self.contracts.multicall,
            "Contracts"
        );
        tracing::info!(
            max_calls_per_batch = self.batch.max_calls_per_batch,
            max_concurrent_batches = self.batch.max_concurrent_batches,
            "Batching"
        );
    }
}
