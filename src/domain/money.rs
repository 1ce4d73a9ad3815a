//! Numeric bounds for money and quantity columns
//!
//! Inputs are checked against the `NUMERIC(p, s)` column they are stored in,
//! so out-of-range values are rejected as bad input instead of failing the
//! insert. Weighted totals use checked arithmetic.

use rust_decimal::Decimal;
use thiserror::Error;

/// Precision and scale of a `NUMERIC(p, s)` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericBounds {
    pub precision: u32,
    pub scale: u32,
}

/// Bid amounts and tender budgets: `NUMERIC(14, 2)`
pub const AMOUNT: NumericBounds = NumericBounds {
    precision: 14,
    scale: 2,
};

/// Requirement quantities: `NUMERIC(14, 3)`
pub const QUANTITY: NumericBounds = NumericBounds {
    precision: 14,
    scale: 3,
};

impl NumericBounds {
    /// Exclusive upper bound on the magnitude
    pub fn limit(&self) -> Decimal {
        Decimal::from(10i64.pow(self.precision - self.scale))
    }

    /// Whether `value` is stored exactly, without rounding or overflow
    pub fn holds(&self, value: Decimal) -> bool {
        value.abs() < self.limit() && value.normalize().scale() <= self.scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("weighted total exceeds the supported range")]
pub struct TotalOverflow;

/// `amount × quantity`, or [`TotalOverflow`] when it does not fit
pub fn line_total(amount: Decimal, quantity: Decimal) -> Result<Decimal, TotalOverflow> {
    amount.checked_mul(quantity).ok_or(TotalOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_bounds() {
        assert!(AMOUNT.holds(dec!(999999999999.99)));
        assert!(AMOUNT.holds(dec!(12.50)));
        assert!(AMOUNT.holds(dec!(12.500)));
        assert!(!AMOUNT.holds(dec!(1000000000000)));
        assert!(!AMOUNT.holds(dec!(12.505)));
        assert!(!AMOUNT.holds(Decimal::MAX / dec!(2)));
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(QUANTITY.holds(dec!(99999999999.999)));
        assert!(QUANTITY.holds(dec!(2.5)));
        assert!(!QUANTITY.holds(dec!(100000000000)));
        assert!(!QUANTITY.holds(dec!(0.0005)));
    }

    #[test]
    fn test_largest_line_total_fits() {
        let total = line_total(dec!(999999999999.99), dec!(99999999999.999)).unwrap();
        assert!(total > dec!(99999999999990000000000));
        assert!(line_total(Decimal::MAX / dec!(2), dec!(10)).is_err());
    }
}
