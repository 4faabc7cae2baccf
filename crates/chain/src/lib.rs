//! Ledger access layer for the Maker vault snapshot.
//!
//! This crate provides:
//! - Contract bindings for DssCdpManager, IlkRegistry, Vat, Spotter, ERC20 and Multicall3
//! - The [`CallTransport`] collaborator interface for batched raw reads
//! - A Multicall3 transport over an Alloy HTTP provider, pinned to a block
//! - The [`BatchResolver`]: typed, order-preserving batches with per-call success
//!
//! With the `testing` feature (always on in this crate's own tests) it also
//! exposes an in-memory DSS ledger implementing [`CallTransport`].

mod batch;
pub mod contracts;
mod provider;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod transport;

pub use batch::{BatchError, BatchResolver, CallOutcome};
pub use contracts::{
    ilk_from_name, DssContracts, IDssCdpManager, IERC20Metadata, IIlkRegistry, IMulticall3,
    ISpotter, IVat, MULTICALL3_ADDRESS,
};
pub use provider::{Multicall3Transport, DEFAULT_MAX_CALLS_PER_BATCH, DEFAULT_MAX_CONCURRENT_BATCHES};
pub use transport::{CallTransport, RawCall, RawReturn};
