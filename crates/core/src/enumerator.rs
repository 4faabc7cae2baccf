//! Vault id enumeration from the CDP manager counter.

use alloy::primitives::Address;
use liquidations_chain::{BatchResolver, IDssCdpManager};
use tracing::debug;

use crate::error::SnapshotError;
use crate::position::PositionId;

/// Lists every vault id ever opened through the CDP manager.
#[derive(Debug, Clone)]
pub struct PositionEnumerator {
    resolver: BatchResolver,
    cdp_manager: Address,
}

impl PositionEnumerator {
    pub fn new(resolver: BatchResolver, cdp_manager: Address) -> Self {
        Self {
            resolver,
            cdp_manager,
        }
    }

    /// `cdpi()` at `block`.
    pub async fn total_count(&self, block: u64) -> Result<u64, SnapshotError> {
        let count = self
            .resolver
            .read_one(self.cdp_manager, IDssCdpManager::cdpiCall {}, block)
            .await?
            ._0;
        u64::try_from(count).map_err(|_| SnapshotError::PositionCountOverflow(count))
    }

    /// Ids `1..=cdpi()` at `block`, ascending. Empty when no vault exists.
    pub async fn enumerate(&self, block: u64) -> Result<Vec<PositionId>, SnapshotError> {
        let count = self.total_count(block).await?;
        debug!(count, block, "Enumerated vaults");
        Ok((1..=count).map(PositionId).collect())
    }
}
