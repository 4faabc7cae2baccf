//! Vault data structures, from raw per-call reads to the emitted snapshot row.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use serde::{Serialize, Serializer};

use crate::fixed_point::{to_decimal, Decimal, RAD_DECIMALS, RAY_DECIMALS, WAD_DECIMALS};

/// Vault id assigned by the CDP manager (1-based, dense).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

impl PositionId {
    pub fn as_u256(&self) -> U256 {
        U256::from(self.0)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collateral class (ilk) identifier, e.g. `ETH-A` as null-padded bytes32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollateralClass(pub B256);

impl CollateralClass {
    /// ASCII name when the bytes are a null-padded printable string.
    pub fn name(&self) -> Option<&str> {
        let bytes = self.0.as_slice();
        let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        if len == 0 || bytes[len..].iter().any(|b| *b != 0) {
            return None;
        }
        let name = &bytes[..len];
        if !name.iter().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        std::str::from_utf8(name).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for CollateralClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for CollateralClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Vault registry entry from the CDP manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultRecord {
    pub collateral_class: CollateralClass,
    /// Urn handler holding the urn inside the Vat
    pub urn_handler: Address,
    pub owner: Address,
}

/// Vat urn state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollateralState {
    /// Locked collateral [wad]
    pub ink: U256,
    /// Normalized debt [wad]
    pub art: U256,
}

impl CollateralState {
    pub fn collateral(&self) -> Decimal {
        to_decimal(self.ink, WAD_DECIMALS)
    }

    pub fn normalized_debt(&self) -> Decimal {
        to_decimal(self.art, WAD_DECIMALS)
    }
}

/// Vat ilk parameters. Only `rate` feeds the liquidation price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IlkParameters {
    /// Total normalized debt [wad]
    pub total_art: U256,
    /// Accumulated debt scaling factor [ray]
    pub rate: U256,
    /// Price with safety margin [ray]
    pub spot: U256,
    /// Debt ceiling [rad]
    pub line: U256,
    /// Debt floor [rad]
    pub dust: U256,
}

impl IlkParameters {
    pub fn total_normalized_debt(&self) -> Decimal {
        to_decimal(self.total_art, WAD_DECIMALS)
    }

    pub fn rate(&self) -> Decimal {
        to_decimal(self.rate, RAY_DECIMALS)
    }

    pub fn spot(&self) -> Decimal {
        to_decimal(self.spot, RAY_DECIMALS)
    }

    pub fn debt_ceiling(&self) -> Decimal {
        to_decimal(self.line, RAD_DECIMALS)
    }

    pub fn debt_floor(&self) -> Decimal {
        to_decimal(self.dust, RAD_DECIMALS)
    }
}

/// Spotter parameters for an ilk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpotParameters {
    /// Price feed
    pub pip: Address,
    /// Liquidation ratio [ray]
    pub mat: U256,
}

impl SpotParameters {
    pub fn liquidation_ratio(&self) -> Decimal {
        to_decimal(self.mat, RAY_DECIMALS)
    }
}

/// Collateral token of an ilk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralAsset {
    pub token: Address,
    /// `None` when `decimals()` failed
    pub decimals: Option<u8>,
}

/// Every field read for one vault, joined by position index.
///
/// `None` means the read failed or was never issued because a read it
/// depends on failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedPositionRecord {
    pub id: PositionId,
    pub collateral_class: Option<CollateralClass>,
    pub urn_handler: Option<Address>,
    pub owner: Option<Address>,
    pub token: Option<Address>,
    pub decimals: Option<u8>,
    pub spot: Option<SpotParameters>,
    pub collateral: Option<CollateralState>,
    pub ilk: Option<IlkParameters>,
}

impl JoinedPositionRecord {
    /// Record with nothing resolved yet.
    pub fn empty(id: PositionId) -> Self {
        Self {
            id,
            collateral_class: None,
            urn_handler: None,
            owner: None,
            token: None,
            decimals: None,
            spot: None,
            collateral: None,
            ilk: None,
        }
    }

    pub fn vault(&self) -> Option<VaultRecord> {
        Some(VaultRecord {
            collateral_class: self.collateral_class?,
            urn_handler: self.urn_handler?,
            owner: self.owner?,
        })
    }

    pub fn asset(&self) -> Option<CollateralAsset> {
        Some(CollateralAsset {
            token: self.token?,
            decimals: self.decimals,
        })
    }
}

/// One row of the liquidation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationPosition {
    pub position_id: PositionId,
    pub ilk: CollateralClass,
    /// Raw locked collateral [wad], unscaled
    #[serde(rename = "collateralAmount", serialize_with = "serialize_decimal_string")]
    pub collateral_amount: U256,
    /// `<chain>:<token>`
    #[serde(rename = "collateral")]
    pub collateral_asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral_decimals: Option<u8>,
    #[serde(rename = "liqPrice")]
    pub liquidation_price: f64,
    /// EIP-55 checksummed, same casing as the token in `collateral`
    #[serde(serialize_with = "serialize_checksummed")]
    pub owner: Address,
}

fn serialize_decimal_string<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn serialize_checksummed<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.to_checksum(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use liquidations_chain::ilk_from_name;

    #[test]
    fn test_collateral_class_name() {
        let eth_a = CollateralClass(ilk_from_name("ETH-A"));
        assert_eq!(eth_a.name(), Some("ETH-A"));
        assert_eq!(eth_a.to_string(), "ETH-A");

        let empty = CollateralClass(B256::ZERO);
        assert!(empty.is_empty());
        assert_eq!(empty.name(), None);

        // Non-null byte after padding: not a name
        let mut bytes = [0u8; 32];
        bytes[..3].copy_from_slice(b"ABC");
        bytes[31] = 1;
        let odd = CollateralClass(B256::from(bytes));
        assert_eq!(odd.name(), None);
        assert!(odd.to_string().starts_with("0x414243"));
    }

    #[test]
    fn test_ilk_parameter_scales() {
        let params = IlkParameters {
            total_art: U256::from(5u64) * U256::from(10u64).pow(U256::from(18)),
            rate: U256::from(2u64) * U256::from(10u64).pow(U256::from(27)),
            spot: U256::ZERO,
            line: U256::from(7u64) * U256::from(10u64).pow(U256::from(45)),
            dust: U256::from(10u64).pow(U256::from(44)),
        };
        assert_eq!(params.total_normalized_debt().to_string(), "5");
        assert_eq!(params.rate().to_string(), "2");
        assert_eq!(params.debt_ceiling().to_string(), "7");
        assert_eq!(params.debt_floor().to_string(), "0.1");
    }

    #[test]
    fn test_record_accessors() {
        let mut record = JoinedPositionRecord::empty(PositionId(4));
        assert!(record.vault().is_none());
        assert!(record.asset().is_none());

        record.collateral_class = Some(CollateralClass(ilk_from_name("WBTC-A")));
        record.urn_handler = Some(Address::with_last_byte(1));
        record.owner = Some(Address::with_last_byte(2));
        record.token = Some(Address::with_last_byte(3));

        let vault = record.vault().unwrap();
        assert_eq!(vault.owner, Address::with_last_byte(2));
        let asset = record.asset().unwrap();
        assert_eq!(asset.decimals, None);
    }

    #[test]
    fn test_position_serialization() {
        let position = LiquidationPosition {
            position_id: PositionId(12),
            ilk: CollateralClass(ilk_from_name("ETH-A")),
            collateral_amount: U256::from(2_000_000_000_000_000_000u128),
            collateral_asset: "ethereum:0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string(),
            collateral_decimals: Some(18),
            liquidation_price: 0.75,
            owner: address!("0000000000000000000000000000000000000011"),
        };

        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["positionId"], 12);
        assert_eq!(json["ilk"], "ETH-A");
        assert_eq!(json["collateralAmount"], "2000000000000000000");
        assert_eq!(json["collateral"], "ethereum:0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        assert_eq!(json["collateralDecimals"], 18);
        assert_eq!(json["liqPrice"], 0.75);
        assert_eq!(json["owner"], "0x0000000000000000000000000000000000000011");
    }

    #[test]
    fn test_owner_casing_matches_collateral() {
        let token = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let position = LiquidationPosition {
            position_id: PositionId(7),
            ilk: CollateralClass(ilk_from_name("ETH-A")),
            collateral_amount: U256::from(1u64),
            collateral_asset: format!("ethereum:{}", token.to_checksum(None)),
            collateral_decimals: None,
            liquidation_price: 1.0,
            owner: address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599"),
        };

        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["owner"], "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");
        assert_eq!(json["collateral"], "ethereum:0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    }
}
