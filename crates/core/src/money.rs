//! Conversions between `Decimal` money amounts and `f64` ratios.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Converts a decimal to `f64`, yielding 0.0 for values outside the `f64` range.
#[must_use]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Converts an `f64` to a decimal, yielding zero for NaN or infinite input.
#[must_use]
pub fn from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// `numerator / denominator` as a ratio, 0.0 when the denominator is not positive.
#[must_use]
pub fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator <= Decimal::ZERO {
        return 0.0;
    }
    to_f64(numerator / denominator)
}

/// Scales an amount by an `f64` factor.
#[must_use]
pub fn scale(amount: Decimal, factor: f64) -> Decimal {
    amount * from_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ratio_guards_zero_denominator() {
        assert!((ratio(dec!(5), dec!(0))).abs() < f64::EPSILON);
        assert!((ratio(dec!(5), dec!(20)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn from_f64_rejects_nan() {
        assert_eq!(from_f64(f64::NAN), Decimal::ZERO);
        assert_eq!(scale(dec!(100000), 0.1), dec!(10000));
    }
}
