//! Maker (DSS) contract bindings.
//!
//! Only the view functions needed to rebuild a vault and its collateral
//! parameters are declared. Units follow the DSS conventions:
//! wad = 10^18, ray = 10^27, rad = 10^45.

use alloy::primitives::{address, Address, B256};
use alloy::sol;

sol! {
    /// DssCdpManager: vault registry (cdp id -> ilk, urn handler, owner)
    #[derive(Debug, PartialEq, Eq)]
    interface IDssCdpManager {
        function cdpi() external view returns (uint256);
        function ilks(uint256 cdp) external view returns (bytes32);
        function urns(uint256 cdp) external view returns (address);
        function owns(uint256 cdp) external view returns (address);
    }

    /// IlkRegistry: ilk -> collateral token
    #[derive(Debug, PartialEq, Eq)]
    interface IIlkRegistry {
        function gem(bytes32 ilk) external view returns (address);
    }

    /// Vat: core accounting
    #[derive(Debug, PartialEq, Eq)]
    interface IVat {
        /// ink: locked collateral [wad], art: normalized debt [wad]
        function urns(bytes32 ilk, address urn) external view returns (uint256 ink, uint256 art);

        /// Art [wad], rate [ray], spot [ray], line [rad], dust [rad]
        function ilks(bytes32 ilk) external view returns (
            uint256 Art,
            uint256 rate,
            uint256 spot,
            uint256 line,
            uint256 dust
        );
    }

    /// Spotter: price feed and liquidation ratio per ilk
    #[derive(Debug, PartialEq, Eq)]
    interface ISpotter {
        /// pip: price feed, mat: liquidation ratio [ray]
        function ilks(bytes32 ilk) external view returns (address pip, uint256 mat);
    }
}

/// Addresses of the DSS contracts a snapshot reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DssContracts {
    /// DssCdpManager
    pub cdp_manager: Address,
    /// IlkRegistry
    pub ilk_registry: Address,
    /// MCD_VAT
    pub vat: Address,
    /// MCD_SPOT
    pub spotter: Address,
}

impl DssContracts {
    /// Ethereum mainnet deployment (chainlog.makerdao.com).
    pub const fn mainnet() -> Self {
        Self {
            cdp_manager: address!("5ef30b9986345249bc32d8928B7ee64DE9435E39"),
            ilk_registry: address!("5a464C28D19848f44199D003BeF5ecc87d090F87"),
            vat: address!("35D1b3F3D7966A1DFe207aa4514C12a259A0492B"),
            spotter: address!("65C79fcB50Ca1594B025960e539eD7A9a6D434A3"),
        }
    }
}

impl Default for DssContracts {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Encode an ilk name ("ETH-A") as its null-padded bytes32 identifier.
///
/// Names longer than 32 bytes are truncated.
pub fn ilk_from_name(name: &str) -> B256 {
    let mut bytes = [0u8; 32];
    let len = name.len().min(32);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    B256::from(bytes)
}
