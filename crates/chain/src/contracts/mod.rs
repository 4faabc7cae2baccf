//! Contract bindings for the Maker vault snapshot.
//!
//! This module provides `sol!` type definitions for the DSS contracts whose
//! state a snapshot reads, plus the common ERC20 and Multicall3 interfaces.
//!
//! # Example
//!
//! ```rust,ignore
//! use liquidations_chain::contracts::{maker::IDssCdpManager, DssContracts};
//!
//! let contracts = DssContracts::mainnet();
//! let urns = resolver
//!     .resolve(ids.iter().map(|id| (contracts.cdp_manager, IDssCdpManager::urnsCall { cdp: *id })).collect(), block)
//!     .await?;
//! ```

pub mod common;
pub mod maker;

pub use common::{IERC20Metadata, IMulticall3, MULTICALL3_ADDRESS};
pub use maker::{ilk_from_name, DssContracts, IDssCdpManager, IIlkRegistry, ISpotter, IVat};
