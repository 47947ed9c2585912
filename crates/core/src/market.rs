//! Real-time quote snapshot delivered by the market-data collaborator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{ratio, to_f64};

/// Tolerance, in percentage points, when comparing a move against the price limit.
pub const LIMIT_TOLERANCE: f64 = 0.01;

/// One level of order-book depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockData {
    pub code: String,
    pub name: String,
    pub current_price: Decimal,
    /// Day change in percent (3.0 = +3%).
    pub change_percent: f64,
    pub high: Decimal,
    pub low: Decimal,
    pub open: Decimal,
    pub prev_close: Decimal,
    /// Volume in lots.
    pub volume: u64,
    pub turnover: Decimal,
    #[serde(default)]
    pub bids: Vec<DepthLevel>,
    #[serde(default)]
    pub asks: Vec<DepthLevel>,
    pub timestamp: DateTime<Utc>,
}

impl StockData {
    /// Creates a flat quote: open, high, low and previous close all equal the current price.
    #[must_use]
    pub fn new(code: impl Into<String>, current_price: Decimal) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            current_price,
            change_percent: 0.0,
            high: current_price,
            low: current_price,
            open: current_price,
            prev_close: current_price,
            volume: 0,
            turnover: Decimal::ZERO,
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_change_percent(mut self, change_percent: f64) -> Self {
        self.change_percent = change_percent;
        self
    }

    #[must_use]
    pub fn with_range(mut self, high: Decimal, low: Decimal) -> Self {
        self.high = high;
        self.low = low;
        self
    }

    #[must_use]
    pub fn with_prev_close(mut self, prev_close: Decimal) -> Self {
        self.prev_close = prev_close;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, bids: Vec<DepthLevel>, asks: Vec<DepthLevel>) -> Self {
        self.bids = bids;
        self.asks = asks;
        self
    }

    #[must_use]
    pub fn is_st(&self) -> bool {
        is_st_name(&self.name)
    }

    /// Daily price-limit band in percent for this board.
    ///
    /// ChiNext (`30…`) and STAR (`688…`) trade within 20%, ST names within 5%,
    /// everything else within 10%.
    #[must_use]
    pub fn limit_percent(&self) -> f64 {
        if self.code.starts_with("30") || self.code.starts_with("688") {
            20.0
        } else if self.is_st() {
            5.0
        } else {
            10.0
        }
    }

    #[must_use]
    pub fn is_limit_up(&self) -> bool {
        (self.change_percent - self.limit_percent()).abs() < LIMIT_TOLERANCE
    }

    #[must_use]
    pub fn is_limit_down(&self) -> bool {
        (self.change_percent + self.limit_percent()).abs() < LIMIT_TOLERANCE
    }

    /// Position of the current price in the day range: 0 at the low, 1 at the high.
    ///
    /// A flat range yields 0.5.
    #[must_use]
    pub fn price_position(&self) -> f64 {
        if self.high == self.low {
            return 0.5;
        }
        ratio(self.current_price - self.low, self.high - self.low)
    }

    /// Total bid volume over total ask volume across the visible depth.
    ///
    /// Returns `None` when there is no ask volume.
    #[must_use]
    pub fn bid_ask_ratio(&self) -> Option<f64> {
        let bid: u64 = self.bids.iter().map(|l| l.volume).sum();
        let ask: u64 = self.asks.iter().map(|l| l.volume).sum();
        if ask == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = bid as f64 / ask as f64;
        Some(ratio)
    }

    /// Relative deviation of `reference` from the live price.
    #[must_use]
    pub fn deviation_from(&self, reference: Decimal) -> f64 {
        ratio((self.current_price - reference).abs(), reference)
    }

    #[must_use]
    pub fn current_price_f64(&self) -> f64 {
        to_f64(self.current_price)
    }
}

/// Special-treatment names start with `ST`, `*ST` or `S*ST`.
#[must_use]
pub fn is_st_name(name: &str) -> bool {
    let name = name.trim_start();
    name.starts_with("ST") || name.starts_with("*ST") || name.starts_with("S*ST")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn limit_band_depends_on_board() {
        assert!((StockData::new("600519", dec!(10)).limit_percent() - 10.0).abs() < f64::EPSILON);
        assert!((StockData::new("300750", dec!(10)).limit_percent() - 20.0).abs() < f64::EPSILON);
        assert!((StockData::new("688981", dec!(10)).limit_percent() - 20.0).abs() < f64::EPSILON);
        let st = StockData::new("600001", dec!(2)).with_name("*ST Foo");
        assert!((st.limit_percent() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn limit_detection_uses_tolerance() {
        let up = StockData::new("600519", dec!(11)).with_change_percent(9.995);
        assert!(up.is_limit_up());
        let near = StockData::new("600519", dec!(11)).with_change_percent(9.9);
        assert!(!near.is_limit_up());
        let down = StockData::new("300750", dec!(8)).with_change_percent(-20.0);
        assert!(down.is_limit_down());
        assert!(!down.is_limit_up());
    }

    #[test]
    fn price_position_in_day_range() {
        let q = StockData::new("600519", dec!(10.5)).with_range(dec!(11), dec!(10));
        assert!((q.price_position() - 0.5).abs() < 1e-9);
        let flat = StockData::new("600519", dec!(10));
        assert!((flat.price_position() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn st_names() {
        assert!(is_st_name("ST Alpha"));
        assert!(is_st_name("*ST Beta"));
        assert!(is_st_name("S*ST Gamma"));
        assert!(!is_st_name("Stable Corp"));
        assert!(!is_st_name("Ping An"));
    }

    #[test]
    fn bid_ask_ratio_needs_ask_volume() {
        let bids = vec![DepthLevel { price: dec!(10), volume: 300 }];
        let q = StockData::new("600519", dec!(10)).with_depth(bids.clone(), vec![]);
        assert!(q.bid_ask_ratio().is_none());
        let asks = vec![DepthLevel { price: dec!(10.01), volume: 100 }];
        let q = q.with_depth(bids, asks);
        assert!((q.bid_ask_ratio().unwrap() - 3.0).abs() < f64::EPSILON);
    }
}
