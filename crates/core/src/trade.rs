use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Kind of an executed (or simulated) trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Buy,
    Sell,
    SimulatedBuy,
    SimulatedSell,
}

impl TradeKind {
    #[must_use]
    pub const fn is_buy(self) -> bool {
        matches!(self, Self::Buy | Self::SimulatedBuy)
    }

    #[must_use]
    pub const fn is_simulated(self) -> bool {
        matches!(self, Self::SimulatedBuy | Self::SimulatedSell)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::SimulatedBuy => "simulated_buy",
            Self::SimulatedSell => "simulated_sell",
        }
    }
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "simulated_buy" => Ok(Self::SimulatedBuy),
            "simulated_sell" => Ok(Self::SimulatedSell),
            other => Err(ParseEnumError::new("trade kind", other)),
        }
    }
}

/// One line of the day-partitioned trade journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub stock_code: String,
    pub stock_name: String,
    pub action: TradeKind,
    pub quantity: u64,
    pub price: Decimal,
    pub amount: Decimal,
    /// Realized P/L; zero for buys.
    pub profit_loss: Decimal,
}

impl TradeRecord {
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        stock_code: impl Into<String>,
        stock_name: impl Into<String>,
        action: TradeKind,
        quantity: u64,
        price: Decimal,
    ) -> Self {
        Self {
            timestamp,
            stock_code: stock_code.into(),
            stock_name: stock_name.into(),
            action,
            quantity,
            price,
            amount: price * Decimal::from(quantity),
            profit_loss: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn with_profit_loss(mut self, profit_loss: Decimal) -> Self {
        self.profit_loss = profit_loss;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_is_price_times_quantity() {
        let record = TradeRecord::new(Utc::now(), "600519", "Moutai", TradeKind::Buy, 300, dec!(24.5));
        assert_eq!(record.amount, dec!(7350));
        assert_eq!(record.profit_loss, Decimal::ZERO);
    }

    #[test]
    fn simulated_buys_count_as_buys() {
        assert!(TradeKind::SimulatedBuy.is_buy());
        assert!(TradeKind::SimulatedBuy.is_simulated());
        assert!(!TradeKind::Sell.is_buy());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&TradeKind::SimulatedSell).unwrap();
        assert_eq!(json, "\"simulated_sell\"");
    }
}
