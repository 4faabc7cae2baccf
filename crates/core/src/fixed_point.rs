//! Exact fixed-point arithmetic for DSS amounts.
//!
//! DSS stores amounts as integers at three scales: wad (10^18) for
//! collateral and normalized debt, ray (10^27) for rates and ratios, rad
//! (10^45) for debt ceilings and floors. [`Decimal`] keeps the raw integer
//! as a 512-bit mantissa next to its scale, so conversions and products of
//! two 256-bit values are exact. Binary floating point only appears at the
//! very end, in [`Decimal::to_f64`].

use std::fmt;

use alloy::primitives::{U256, U512};

/// Scale of wad amounts (collateral, normalized debt).
pub const WAD_DECIMALS: u8 = 18;

/// Scale of ray amounts (rate, mat, spot).
pub const RAY_DECIMALS: u8 = 27;

/// Scale of rad amounts (line, dust).
pub const RAD_DECIMALS: u8 = 45;

/// Fractional digits kept when dividing for a liquidation price.
pub const PRICE_PRECISION: u8 = 27;

/// Largest scale a [`Decimal`] may carry (10^154 < 2^512).
pub const MAX_SCALE: u8 = 154;

/// 10^exp as a 512-bit integer, `None` past [`MAX_SCALE`].
#[inline(always)]
pub fn pow10(exp: u8) -> Option<U512> {
    if exp > MAX_SCALE {
        return None;
    }
    U512::from(10u64).checked_pow(U512::from(exp))
}

#[inline(always)]
fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(value.as_limbs());
    U512::from_limbs(limbs)
}

/// Convert a raw integer at `scale` to a decimal (`raw / 10^scale`).
///
/// `None` past [`MAX_SCALE`].
pub fn try_to_decimal(raw: U256, scale: u8) -> Option<Decimal> {
    if scale > MAX_SCALE {
        return None;
    }
    Some(Decimal {
        mantissa: widen(raw),
        scale,
    })
}

/// [`try_to_decimal`] for the fixed DSS scales (never above 45).
///
/// `scale` must not exceed [`MAX_SCALE`]; debug builds assert it.
#[inline(always)]
pub fn to_decimal(raw: U256, scale: u8) -> Decimal {
    debug_assert!(scale <= MAX_SCALE, "scale {scale} exceeds {MAX_SCALE}");
    Decimal {
        mantissa: widen(raw),
        scale,
    }
}

/// Exact decimal: `mantissa / 10^scale`.
///
/// Equality is numeric: `1.0` at scale 18 equals `1` at scale 0.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: U512,
    scale: u8,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: U512::ZERO,
        scale: 0,
    };

    /// Integer value at scale 0.
    pub fn from_integer(value: U256) -> Self {
        to_decimal(value, 0)
    }

    /// 10^exp as a decimal, `None` past [`MAX_SCALE`].
    pub fn power_of_ten(exp: u8) -> Option<Self> {
        Some(Decimal {
            mantissa: pow10(exp)?,
            scale: 0,
        })
    }

    pub fn mantissa(&self) -> U512 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Same value with trailing fractional zeros removed.
    pub fn normalized(self) -> Self {
        let ten = U512::from(10u64);
        let mut d = self;
        while d.scale > 0 && (d.mantissa % ten).is_zero() {
            d.mantissa /= ten;
            d.scale -= 1;
        }
        d
    }

    /// Mantissa expressed at `target` scale, truncating extra digits.
    pub fn rescale(&self, target: u8) -> Option<U512> {
        if target >= self.scale {
            self.mantissa.checked_mul(pow10(target - self.scale)?)
        } else {
            Some(self.mantissa / pow10(self.scale - target)?)
        }
    }

    /// Exact product. `None` on mantissa overflow or a scale past [`MAX_SCALE`].
    pub fn checked_mul(self, other: Decimal) -> Option<Decimal> {
        let scale = self.scale.checked_add(other.scale)?;
        if scale > MAX_SCALE {
            return None;
        }
        Some(Decimal {
            mantissa: self.mantissa.checked_mul(other.mantissa)?,
            scale,
        })
    }

    /// Quotient truncated to `precision` fractional digits.
    ///
    /// `None` when dividing by zero or when an intermediate overflows.
    pub fn checked_div(self, divisor: Decimal, precision: u8) -> Option<Decimal> {
        if divisor.is_zero() || precision > MAX_SCALE {
            return None;
        }

        // a/10^sa / (b/10^sb) at precision p  =  a * 10^(sb + p - sa) / b
        let shift = divisor.scale as i32 + precision as i32 - self.scale as i32;
        let mantissa = if shift >= 0 {
            let shift = u8::try_from(shift).ok()?;
            self.mantissa.checked_mul(pow10(shift)?)? / divisor.mantissa
        } else {
            let shift = u8::try_from(-shift).ok()?;
            self.mantissa / divisor.mantissa.checked_mul(pow10(shift)?)?
        };

        Some(Decimal {
            mantissa,
            scale: precision,
        })
    }

    /// Narrow to the nearest `f64` (display precision).
    ///
    /// Goes through the exact decimal string so the result is correctly
    /// rounded. Never fails; an unparsable value would come back as NaN.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.mantissa == b.mantissa && a.scale == b.scale
    }
}

impl Eq for Decimal {}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.normalized();
        let digits = n.mantissa.to_string();
        let scale = n.scale as usize;
        if scale == 0 {
            return f.write_str(&digits);
        }

        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{}.{}", int, frac)
    }
}

/// Collateral price at which `collateral` is worth `vault_debt * col_ratio`.
///
/// Returns [`Decimal::ZERO`] when collateral or debt is zero; that zero is a
/// sentinel for "undefined", not a price. `None` only on overflow.
pub fn try_liquidation_price_at_ratio(
    col_ratio: Decimal,
    collateral: Decimal,
    vault_debt: Decimal,
) -> Option<Decimal> {
    if collateral.is_zero() || vault_debt.is_zero() {
        return Some(Decimal::ZERO);
    }
    vault_debt
        .checked_mul(col_ratio)?
        .checked_div(collateral, PRICE_PRECISION)
}

/// [`try_liquidation_price_at_ratio`] with overflow folded into the zero sentinel.
pub fn liquidation_price_at_ratio(col_ratio: Decimal, collateral: Decimal, vault_debt: Decimal) -> Decimal {
    try_liquidation_price_at_ratio(col_ratio, collateral, vault_debt).unwrap_or(Decimal::ZERO)
}
