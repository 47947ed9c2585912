use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::is_st_name;
use crate::money::ratio;

/// A held position as reported by the position store.
///
/// Owned by the caller; only `current_price` is refreshed before analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub code: String,
    pub name: String,
    /// Shares held.
    pub quantity: u64,
    pub cost_price: Decimal,
    /// Trading days held, if known.
    pub holding_days: Option<u32>,
    pub current_price: Option<Decimal>,
}

impl Position {
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, quantity: u64, cost_price: Decimal) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            quantity,
            cost_price,
            holding_days: None,
            current_price: None,
        }
    }

    #[must_use]
    pub fn with_current_price(mut self, price: Decimal) -> Self {
        self.current_price = Some(price);
        self
    }

    #[must_use]
    pub fn with_holding_days(mut self, days: u32) -> Self {
        self.holding_days = Some(days);
        self
    }

    /// Market value, zero while no price is known.
    #[must_use]
    pub fn position_value(&self) -> Decimal {
        self.current_price
            .map_or(Decimal::ZERO, |p| p * Decimal::from(self.quantity))
    }

    /// Unrealized P/L in currency, `None` while no price is known.
    #[must_use]
    pub fn profit_loss(&self) -> Option<Decimal> {
        self.current_price
            .map(|p| (p - self.cost_price) * Decimal::from(self.quantity))
    }

    /// Unrealized P/L relative to cost. Defined only when both prices are positive.
    #[must_use]
    pub fn profit_loss_ratio(&self) -> Option<f64> {
        match self.current_price {
            Some(price) if price > Decimal::ZERO && self.cost_price > Decimal::ZERO => {
                Some(ratio(price - self.cost_price, self.cost_price))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_losing(&self) -> bool {
        self.profit_loss_ratio().is_some_and(|r| r < 0.0)
    }

    #[must_use]
    pub fn is_st(&self) -> bool {
        is_st_name(&self.name)
    }
}

/// Sum of market values across positions.
#[must_use]
pub fn total_value(positions: &[Position]) -> Decimal {
    positions.iter().map(Position::position_value).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn derived_values_need_a_price() {
        let pos = Position::new("600519", "Moutai", 100, dec!(20));
        assert_eq!(pos.position_value(), Decimal::ZERO);
        assert!(pos.profit_loss().is_none());
        assert!(pos.profit_loss_ratio().is_none());
        assert!(!pos.is_losing());
    }

    #[test]
    fn profit_loss_from_current_price() {
        let pos = Position::new("600519", "Moutai", 200, dec!(20)).with_current_price(dec!(18));
        assert_eq!(pos.position_value(), dec!(3600));
        assert_eq!(pos.profit_loss(), Some(dec!(-400)));
        assert!((pos.profit_loss_ratio().unwrap() + 0.1).abs() < 1e-12);
        assert!(pos.is_losing());
    }

    #[test]
    fn zero_cost_has_no_ratio() {
        let pos = Position::new("600519", "Gift", 100, Decimal::ZERO).with_current_price(dec!(5));
        assert!(pos.profit_loss_ratio().is_none());
    }

    #[test]
    fn total_value_skips_unpriced() {
        let positions = vec![
            Position::new("600519", "A", 100, dec!(10)).with_current_price(dec!(12)),
            Position::new("000001", "B", 100, dec!(10)),
        ];
        assert_eq!(total_value(&positions), dec!(1200));
    }
}
