//! Snapshot errors and per-record exclusion reasons.

use alloy::primitives::U256;
use liquidations_chain::BatchError;
use thiserror::Error;

/// Errors that abort a snapshot run.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// A batch came back with a different length than the id sequence.
    #[error("{field} batch has {actual} results for {expected} positions")]
    BatchLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("position count {0} does not fit in u64")]
    PositionCountOverflow(U256),
}

/// Why a joined record produced no snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Exclusion {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("liquidation price is not finite")]
    NonFinitePrice,

    #[error("liquidation price is not positive")]
    NonPositivePrice,
}
