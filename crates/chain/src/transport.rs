//! Transport abstraction for batched ledger reads.
//!
//! A [`CallTransport`] executes a list of raw `(target, calldata)` reads at a
//! given block and hands back one [`RawReturn`] per call, in input order.
//! Decoding, ordering checks and per-call failure handling live in
//! [`crate::BatchResolver`]; the transport only moves bytes.

use alloy::primitives::{Address, Bytes};
use anyhow::Result;
use async_trait::async_trait;

/// A single encoded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    /// Contract to call
    pub target: Address,
    /// ABI-encoded call (selector + arguments)
    pub calldata: Bytes,
}

/// Result of a single read inside a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReturn {
    /// False when the call reverted
    pub success: bool,
    /// Raw return data (revert data when `success` is false)
    pub data: Bytes,
}

impl RawReturn {
    pub fn ok(data: impl Into<Bytes>) -> Self {
        Self {
            success: true,
            data: data.into(),
        }
    }

    pub fn reverted() -> Self {
        Self::default()
    }
}

/// Remote-read collaborator used by the batch resolver.
///
/// Contract:
/// - `aggregate` returns exactly one entry per call, in the same order.
/// - A reverted call is reported as `success = false`, never as an `Err`.
/// - `Err` means the whole batch could not be executed (unreachable node,
///   malformed request) and no partial result exists.
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Latest block number known to the remote ledger.
    async fn latest_block(&self) -> Result<u64>;

    /// Execute all calls against the state at `block`.
    async fn aggregate(&self, calls: Vec<RawCall>, block: u64) -> Result<Vec<RawReturn>>;
}
