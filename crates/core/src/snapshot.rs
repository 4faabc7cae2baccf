//! Snapshot pipeline: pin a block, enumerate, join, price, filter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use liquidations_chain::{BatchResolver, CallTransport, DssContracts};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::enumerator::PositionEnumerator;
use crate::error::{Exclusion, SnapshotError};
use crate::joiner::FieldJoiner;
use crate::liquidation::compute;
use crate::position::LiquidationPosition;

/// Records dropped from a snapshot, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionCounts {
    pub missing_field: usize,
    pub non_finite_price: usize,
    pub non_positive_price: usize,
}

impl ExclusionCounts {
    pub fn record(&mut self, exclusion: &Exclusion) {
        match exclusion {
            Exclusion::MissingField(_) => self.missing_field += 1,
            Exclusion::NonFinitePrice => self.non_finite_price += 1,
            Exclusion::NonPositivePrice => self.non_positive_price += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_field + self.non_finite_price + self.non_positive_price
    }
}

/// Liquidation positions at one block, with run metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub chain: String,
    pub block: u64,
    pub taken_at: DateTime<Utc>,
    /// Vaults enumerated (`cdpi()`)
    pub total_positions: usize,
    pub excluded: ExclusionCounts,
    /// Ascending by position id
    pub positions: Vec<LiquidationPosition>,
}

/// Takes liquidation snapshots of every vault.
#[derive(Debug, Clone)]
pub struct LiquidationSnapshotter {
    resolver: BatchResolver,
    enumerator: PositionEnumerator,
    joiner: FieldJoiner,
    chain: String,
}

impl LiquidationSnapshotter {
    /// `chain` prefixes collateral asset ids (`ethereum:0x...`).
    pub fn new(transport: Arc<dyn CallTransport>, contracts: DssContracts, chain: impl Into<String>) -> Self {
        let resolver = BatchResolver::new(transport);
        Self {
            enumerator: PositionEnumerator::new(resolver.clone(), contracts.cdp_manager),
            joiner: FieldJoiner::new(resolver.clone(), contracts),
            resolver,
            chain: chain.into(),
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Liquidation positions at the latest block.
    pub async fn get_liquidation_snapshot(&self) -> Result<Vec<LiquidationPosition>, SnapshotError> {
        Ok(self.take_snapshot().await?.positions)
    }

    /// Snapshot at the latest block.
    pub async fn take_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let block = self.resolver.latest_block().await?;
        self.snapshot_at(block).await
    }

    /// Snapshot with every read pinned to `block`.
    #[instrument(skip(self), fields(chain = %self.chain))]
    pub async fn snapshot_at(&self, block: u64) -> Result<Snapshot, SnapshotError> {
        let taken_at = Utc::now();

        let ids = self.enumerator.enumerate(block).await?;
        info!(block, positions = ids.len(), "Vaults enumerated");

        let records = self.joiner.join(&ids, block).await?;

        let mut excluded = ExclusionCounts::default();
        let mut positions = Vec::with_capacity(records.len());
        for record in &records {
            match compute(record, &self.chain) {
                Ok(position) => positions.push(position),
                Err(reason) => {
                    debug!(position = %record.id, reason = %reason, "Position excluded");
                    excluded.record(&reason);
                }
            }
        }

        info!(
            block,
            emitted = positions.len(),
            excluded = excluded.total(),
            missing_field = excluded.missing_field,
            non_finite = excluded.non_finite_price,
            non_positive = excluded.non_positive_price,
            "Snapshot complete"
        );

        Ok(Snapshot {
            chain: self.chain.clone(),
            block,
            taken_at,
            total_positions: ids.len(),
            excluded,
            positions,
        })
    }
}
