//! Multicall3-backed transport over an HTTP JSON-RPC provider.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::eips::BlockId;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::contracts::IMulticall3::{self, Call3};
use crate::transport::{CallTransport, RawCall, RawReturn};

/// Default number of calls packed into one `aggregate3` request.
pub const DEFAULT_MAX_CALLS_PER_BATCH: usize = 500;

/// Default number of `aggregate3` requests in flight at once.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

/// Transport that packs reads into Multicall3 `aggregate3` calls.
///
/// Every call is sent with `allowFailure = true`, so a reverting read only
/// marks its own entry as failed. Large batches are split into chunks of
/// `max_calls_per_batch`; chunks run with bounded concurrency and are
/// reassembled in their original order.
#[derive(Debug, Clone)]
pub struct Multicall3Transport {
    /// JSON-RPC endpoint
    rpc_url: Url,
    /// Multicall3 deployment
    multicall: Address,
    /// Calls per aggregate3 request
    max_calls_per_batch: usize,
    /// aggregate3 requests in flight
    max_concurrent_batches: usize,
}

impl Multicall3Transport {
    /// Create a transport without touching the network.
    pub fn new(rpc_url: &str, multicall: Address) -> Result<Self> {
        let rpc_url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL '{}'", rpc_url))?;

        Ok(Self {
            rpc_url,
            multicall,
            max_calls_per_batch: DEFAULT_MAX_CALLS_PER_BATCH,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        })
    }

    /// Create a transport and verify the endpoint serves the expected chain.
    pub async fn connect(rpc_url: &str, multicall: Address, expected_chain_id: u64) -> Result<Self> {
        let transport = Self::new(rpc_url, multicall)?;

        info!(rpc = rpc_url, multicall = %multicall, "Initializing Multicall3 transport");

        let provider = ProviderBuilder::new().on_http(transport.rpc_url.clone());
        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain id")?;
        let block = provider
            .get_block_number()
            .await
            .context("Failed to query block number")?;

        if chain_id != expected_chain_id {
            warn!(
                expected = expected_chain_id,
                actual = chain_id,
                "RPC endpoint serves a different chain than configured"
            );
        }
        info!(chain_id, block, "Provider connection verified");

        Ok(transport)
    }

    /// Set the number of calls per aggregate3 request (minimum 1).
    pub fn with_max_calls_per_batch(mut self, max_calls: usize) -> Self {
        self.max_calls_per_batch = max_calls.max(1);
        self
    }

    /// Set the number of aggregate3 requests in flight (minimum 1).
    pub fn with_max_concurrent_batches(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent_batches = max_concurrent.max(1);
        self
    }

    /// Multicall3 address used by this transport.
    pub fn multicall_address(&self) -> Address {
        self.multicall
    }
}

#[async_trait]
impl CallTransport for Multicall3Transport {
    async fn latest_block(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let block = provider.get_block_number().await?;
        Ok(block)
    }

    async fn aggregate(&self, calls: Vec<RawCall>, block: u64) -> Result<Vec<RawReturn>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let multicall = IMulticall3::new(self.multicall, &provider);

        let chunks: Vec<Vec<Call3>> = calls
            .chunks(self.max_calls_per_batch)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|call| Call3 {
                        target: call.target,
                        allowFailure: true,
                        callData: call.calldata.clone(),
                    })
                    .collect()
            })
            .collect();

        debug!(
            calls = calls.len(),
            chunks = chunks.len(),
            block,
            "Dispatching aggregate3 batch"
        );

        // `buffered` (not `buffer_unordered`): chunk results must come back in input order
        let multicall = &multicall;
        let per_chunk: Vec<Vec<RawReturn>> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| async move {
                let expected = chunk.len();
                let returned = multicall
                    .aggregate3(chunk)
                    .block(BlockId::number(block))
                    .call()
                    .await
                    .with_context(|| format!("aggregate3 chunk {} failed at block {}", index, block))?
                    .returnData;

                if returned.len() != expected {
                    anyhow::bail!(
                        "aggregate3 chunk {} returned {} results for {} calls",
                        index,
                        returned.len(),
                        expected
                    );
                }

                Ok::<Vec<RawReturn>, anyhow::Error>(returned
                    .into_iter()
                    .map(|r| RawReturn {
                        success: r.success,
                        data: r.returnData,
                    })
                    .collect())
            })
            .buffered(self.max_concurrent_batches)
            .try_collect()
            .await?;

        Ok(per_chunk.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::MULTICALL3_ADDRESS;

    #[test]
    fn test_builder_clamps_limits() {
        let transport = Multicall3Transport::new("https://eth.llamarpc.com", MULTICALL3_ADDRESS)
            .unwrap()
            .with_max_calls_per_batch(0)
            .with_max_concurrent_batches(0);

        assert_eq!(transport.max_calls_per_batch, 1);
        assert_eq!(transport.max_concurrent_batches, 1);
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(Multicall3Transport::new("not a url", MULTICALL3_ADDRESS).is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        // Unroutable endpoint: an empty batch must not issue any request
        let transport = Multicall3Transport::new("http://127.0.0.1:1", MULTICALL3_ADDRESS).unwrap();
        let results = transport.aggregate(Vec::new(), 1).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_connect_mainnet() {
        let url = std::env::var("ETH_RPC_URL").unwrap_or_else(|_| "https://eth.llamarpc.com".to_string());
        let transport = Multicall3Transport::connect(&url, MULTICALL3_ADDRESS, 1).await;
        assert!(transport.is_ok());
    }
}
