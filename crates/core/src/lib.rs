//! Maker vault liquidation snapshot core.
//!
//! This crate provides:
//! - Exact wad/ray/rad fixed-point arithmetic
//! - Vault enumeration from the CDP manager counter
//! - Batched field resolution joined by position index
//! - Liquidation price calculation and filtering
//! - The snapshot pipeline driver
//! - Configuration loading
//!
//! All reads go through [`liquidations_chain::BatchResolver`], pinned to a
//! single block per snapshot.

pub mod config;
mod enumerator;
mod error;
pub mod fixed_point;
mod joiner;
mod liquidation;
mod position;
mod snapshot;

pub use config::{BatchConfig, ChainConfig, ContractsConfig, SnapshotConfig};
pub use enumerator::PositionEnumerator;
pub use error::{Exclusion, SnapshotError};
pub use fixed_point::{liquidation_price_at_ratio, to_decimal, try_to_decimal, Decimal};
pub use joiner::FieldJoiner;
pub use liquidation::{compute, liquidation_price};
pub use position::{
    CollateralAsset, CollateralClass, CollateralState, IlkParameters, JoinedPositionRecord,
    LiquidationPosition, PositionId, SpotParameters, VaultRecord,
};
pub use snapshot::{ExclusionCounts, LiquidationSnapshotter, Snapshot};
