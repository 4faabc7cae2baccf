//! Liquidation price calculation for a joined vault record.

use crate::error::Exclusion;
use crate::fixed_point::{try_liquidation_price_at_ratio, Decimal};
use crate::position::{CollateralState, IlkParameters, JoinedPositionRecord, LiquidationPosition, SpotParameters};

/// Exact liquidation price: `art * rate * mat / ink`.
///
/// Zero when the vault has no collateral or no debt. `None` on overflow.
pub fn liquidation_price(urn: &CollateralState, ilk: &IlkParameters, spot: &SpotParameters) -> Option<Decimal> {
    let debt = urn.normalized_debt().checked_mul(ilk.rate())?;
    try_liquidation_price_at_ratio(spot.liquidation_ratio(), urn.collateral(), debt)
}

/// Build the snapshot row for `record`, or the reason it has none.
///
/// `chain` prefixes the collateral token (`ethereum:0x...`). Token decimals
/// are passed through untouched; the collateral amount stays raw.
pub fn compute(record: &JoinedPositionRecord, chain: &str) -> Result<LiquidationPosition, Exclusion> {
    let ilk = record.collateral_class.ok_or(Exclusion::MissingField("ilk"))?;
    let owner = record.owner.ok_or(Exclusion::MissingField("owner"))?;
    let token = record.token.ok_or(Exclusion::MissingField("gem"))?;
    let urn = record.collateral.ok_or(Exclusion::MissingField("urn"))?;
    let ilk_params = record.ilk.ok_or(Exclusion::MissingField("rate"))?;
    let spot = record.spot.ok_or(Exclusion::MissingField("mat"))?;

    let price = liquidation_price(&urn, &ilk_params, &spot)
        .ok_or(Exclusion::NonFinitePrice)?
        .to_f64();
    if !price.is_finite() {
        return Err(Exclusion::NonFinitePrice);
    }
    if price <= 0.0 {
        return Err(Exclusion::NonPositivePrice);
    }

    Ok(LiquidationPosition {
        position_id: record.id,
        ilk,
        collateral_amount: urn.ink,
        collateral_asset: format!("{}:{}", chain, token.to_checksum(None)),
        collateral_decimals: record.decimals,
        liquidation_price: price,
        owner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{CollateralClass, PositionId};
    use alloy::primitives::{address, Address, U256};
    use liquidations_chain::ilk_from_name;

    fn scaled(n: u64, decimals: u8) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(decimals))
    }

    /// 2 WETH locked, 1 normalized DAI, rate 1.0, mat 1.5.
    fn record() -> JoinedPositionRecord {
        JoinedPositionRecord {
            id: PositionId(7),
            collateral_class: Some(CollateralClass(ilk_from_name("ETH-A"))),
            urn_handler: Some(Address::with_last_byte(1)),
            owner: Some(Address::with_last_byte(2)),
            token: Some(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
            decimals: Some(18),
            spot: Some(SpotParameters {
                pip: Address::with_last_byte(3),
                mat: scaled(15, 26),
            }),
            collateral: Some(CollateralState {
                ink: scaled(2, 18),
                art: scaled(1, 18),
            }),
            ilk: Some(IlkParameters {
                rate: scaled(1, 27),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_compute_reference_vault() {
        let position = compute(&record(), "ethereum").unwrap();

        assert_eq!(position.position_id, PositionId(7));
        assert_eq!(position.liquidation_price, 0.75);
        assert_eq!(position.collateral_amount, scaled(2, 18));
        assert_eq!(
            position.collateral_asset,
            "ethereum:0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
        );
        assert_eq!(position.collateral_decimals, Some(18));
        assert_eq!(position.owner, Address::with_last_byte(2));
    }

    #[test]
    fn test_zero_collateral_excluded() {
        let mut r = record();
        r.collateral = Some(CollateralState {
            ink: U256::ZERO,
            art: scaled(1, 18),
        });
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::NonPositivePrice));
    }

    #[test]
    fn test_zero_debt_excluded() {
        let mut r = record();
        r.collateral = Some(CollateralState {
            ink: scaled(5, 18),
            art: U256::ZERO,
        });
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::NonPositivePrice));

        // A zero rate zeroes the debt too
        let mut r = record();
        r.ilk = Some(IlkParameters::default());
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::NonPositivePrice));
    }

    #[test]
    fn test_zero_ratio_excluded() {
        let mut r = record();
        r.spot = Some(SpotParameters::default());
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::NonPositivePrice));
    }

    #[test]
    fn test_missing_fields_excluded() {
        let mut r = record();
        r.collateral = None;
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::MissingField("urn")));

        let mut r = record();
        r.spot = None;
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::MissingField("mat")));

        let mut r = record();
        r.owner = None;
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::MissingField("owner")));

        // Decimals are optional
        let mut r = record();
        r.decimals = None;
        assert_eq!(compute(&r, "ethereum").unwrap().collateral_decimals, None);
    }

    #[test]
    fn test_overflowing_price_excluded() {
        let mut r = record();
        r.collateral = Some(CollateralState {
            ink: U256::from(1u64),
            art: U256::MAX,
        });
        r.ilk = Some(IlkParameters {
            rate: U256::MAX,
            ..Default::default()
        });
        r.spot = Some(SpotParameters {
            pip: Address::ZERO,
            mat: U256::MAX,
        });
        assert_eq!(compute(&r, "ethereum"), Err(Exclusion::NonFinitePrice));
    }

    #[test]
    fn test_exact_before_narrowing() {
        let r = record();
        let price = liquidation_price(&r.collateral.unwrap(), &r.ilk.unwrap(), &r.spot.unwrap()).unwrap();
        assert_eq!(price.to_string(), "0.75");
    }
}
