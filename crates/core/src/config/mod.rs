//! Configuration for the snapshot run.
//!
//! This module provides:
//! - Chain configuration (name, chain ID, RPC endpoint)
//! - Contract addresses (DSS contracts and Multicall3)
//! - Batching limits for the Multicall3 transport

mod chain;
mod snapshot;

pub use chain::ChainConfig;
pub use snapshot::{BatchConfig, ContractsConfig, SnapshotConfig, CONFIG_PATH_ENV};
