use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point money/P&L value: an `i64` scaled by [`SCALE`] (1e-6).
///
/// All cash, price, and P&L fields in this crate use `Decimal` rather than
/// `f64` so that accounting never drifts from binary floating-point
/// rounding. Returns, variances, and anything downstream of a square root
/// or percentile stay plain `f64` (see the optimizer and metrics crates).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal(i64);

/// Serializes as a plain JSON number (dollars), not the raw micro-scaled
/// integer, so persisted artifacts stay human-readable.
impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Decimal::from_f64(value))
    }
}

pub const SCALE: i64 = 1_000_000;

impl Decimal {
    pub const ZERO: Decimal = Decimal(0);
    pub const MAX: Decimal = Decimal(i64::MAX);
    pub const MIN: Decimal = Decimal(i64::MIN);

    pub const fn from_raw(raw: i64) -> Self {
        Decimal(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Builds a `Decimal` from a floating-point dollar amount, rounding to
    /// the nearest micro. Intended for ingesting prices/quantities from
    /// external sources (market data, config); never used on values
    /// already carried as `Decimal`.
    pub fn from_f64(value: f64) -> Self {
        Decimal((value * SCALE as f64).round() as i64)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn saturating_add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_sub(rhs.0))
    }

    pub fn abs(self) -> Decimal {
        Decimal(self.0.saturating_abs())
    }

    pub fn signum(self) -> i64 {
        self.0.signum()
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiplies by an integer quantity, returning `None` on overflow
    /// rather than wrapping.
    pub fn checked_mul_qty(self, qty: i64) -> Option<Decimal> {
        self.0.checked_mul(qty).map(Decimal)
    }

    /// Scales by a plain `f64` factor (used for cost-model percentages and
    /// risk-scaling multipliers, which are not fixed-point quantities).
    pub fn scale_by(self, factor: f64) -> Decimal {
        Decimal(((self.0 as f64) * factor).round() as i64)
    }
}

impl Add for Decimal {
    type Output = Decimal;
    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl Sub for Decimal {
    type Output = Decimal;
    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl Neg for Decimal {
    type Output = Decimal;
    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let neg = self.0 < 0;
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u64;
        let frac = abs % SCALE as u64;
        if neg {
            write!(f, "-{}.{:06}", whole, frac)
        } else {
            write!(f, "{}.{:06}", whole, frac)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_additive_identity() {
        let d = Decimal::from_raw(42);
        assert_eq!(d + Decimal::ZERO, d);
    }

    #[test]
    fn add_and_sub_roundtrip() {
        let a = Decimal::from_raw(1_500_000);
        let b = Decimal::from_raw(250_000);
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn neg_produces_opposite_sign() {
        let a = Decimal::from_raw(100);
        assert_eq!(-a, Decimal::from_raw(-100));
    }

    #[test]
    fn saturating_add_clamps_at_max() {
        assert_eq!(Decimal::MAX.saturating_add(Decimal::from_raw(1)), Decimal::MAX);
    }

    #[test]
    fn saturating_sub_clamps_at_min() {
        assert_eq!(Decimal::MIN.saturating_sub(Decimal::from_raw(1)), Decimal::MIN);
    }

    #[test]
    fn abs_of_negative() {
        assert_eq!(Decimal::from_raw(-50).abs(), Decimal::from_raw(50));
    }

    #[test]
    fn checked_mul_qty_normal() {
        assert_eq!(
            Decimal::from_raw(1_000_000).checked_mul_qty(3),
            Some(Decimal::from_raw(3_000_000))
        );
    }

    #[test]
    fn checked_mul_qty_overflow_returns_none() {
        assert_eq!(Decimal::MAX.checked_mul_qty(2), None);
    }

    #[test]
    fn display_formats_with_six_decimal_places() {
        assert_eq!(Decimal::from_raw(1_500_000).to_string(), "1.500000");
    }

    #[test]
    fn display_negative() {
        assert_eq!(Decimal::from_raw(-1_500_000).to_string(), "-1.500000");
    }

    #[test]
    fn from_f64_roundtrips_to_nearest_micro() {
        assert_eq!(Decimal::from_f64(1.5), Decimal::from_raw(1_500_000));
    }

    #[test]
    fn scale_by_applies_float_factor() {
        let d = Decimal::from_raw(1_000_000);
        assert_eq!(d.scale_by(0.5), Decimal::from_raw(500_000));
    }
}
