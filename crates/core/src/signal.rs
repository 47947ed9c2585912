//! Trade signals produced by the decision engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Action requested by a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    StrongSell,
    Sell,
    Hold,
    Buy,
    NoAction,
}

impl TradeAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrongSell => "strong_sell",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::Buy => "buy",
            Self::NoAction => "no_action",
        }
    }

    #[must_use]
    pub const fn is_sell(self) -> bool {
        matches!(self, Self::StrongSell | Self::Sell)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strong_sell" => Ok(Self::StrongSell),
            "sell" => Ok(Self::Sell),
            "hold" => Ok(Self::Hold),
            "buy" => Ok(Self::Buy),
            "no_action" => Ok(Self::NoAction),
            other => Err(ParseEnumError::new("action", other)),
        }
    }
}

/// Urgency of a signal. Lower rank is more urgent, so the derived `Ord`
/// sorts `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Priority {
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(ParseEnumError::new("priority", other)),
        }
    }
}

/// Five-bucket label attached to a 0–100 composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Recommendation {
    /// Buckets: `<30` strong sell, `<40` sell, `<60` hold, `<80` buy, else strong buy.
    #[must_use]
    pub fn from_total_score(score: f64) -> Self {
        if score < 30.0 {
            Self::StrongSell
        } else if score < 40.0 {
            Self::Sell
        } else if score < 60.0 {
            Self::Hold
        } else if score < 80.0 {
            Self::Buy
        } else {
            Self::StrongBuy
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrongSell => "strong_sell",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::Buy => "buy",
            Self::StrongBuy => "strong_buy",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite model score on the 0–100 scale, with the confidence behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub score: f64,
    pub confidence: f64,
}

impl CompositeScore {
    /// Creates a composite score clamped to `[0, 100]` with confidence in `[0, 1]`.
    #[must_use]
    pub fn new(score: f64, confidence: f64) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
        Self {
            score,
            confidence: crate::model::clamp_unit(confidence),
        }
    }

    #[must_use]
    pub fn recommendation(&self) -> Recommendation {
        Recommendation::from_total_score(self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub stock_code: String,
    pub stock_name: String,
    pub action: TradeAction,
    pub priority: Priority,
    pub quantity: u64,
    pub price: Option<Decimal>,
    pub reasons: Vec<String>,
    pub score: Option<f64>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    #[must_use]
    pub fn is_sell(&self) -> bool {
        self.action.is_sell()
    }

    #[must_use]
    pub fn is_high_priority(&self) -> bool {
        self.priority <= Priority::High
    }

    /// Notional value of the signal, zero without a price.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.price
            .map_or(Decimal::ZERO, |p| p * Decimal::from(self.quantity))
    }
}

/// Most urgent first: priority ascending, then confidence descending.
#[must_use]
pub fn urgency_order(a: &TradeSignal, b: &TradeSignal) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(priority: Priority, confidence: f64) -> TradeSignal {
        TradeSignal {
            stock_code: "600519".to_string(),
            stock_name: String::new(),
            action: TradeAction::Sell,
            priority,
            quantity: 100,
            price: None,
            reasons: vec![],
            score: None,
            confidence,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn critical_sorts_first() {
        let mut signals = vec![
            signal(Priority::Low, 0.9),
            signal(Priority::Critical, 0.5),
            signal(Priority::High, 0.6),
            signal(Priority::High, 0.8),
        ];
        signals.sort_by(urgency_order);
        let order: Vec<_> = signals.iter().map(|s| (s.priority, s.confidence)).collect();
        assert_eq!(
            order,
            vec![
                (Priority::Critical, 0.5),
                (Priority::High, 0.8),
                (Priority::High, 0.6),
                (Priority::Low, 0.9)
            ]
        );
    }

    #[test]
    fn recommendation_buckets() {
        assert_eq!(Recommendation::from_total_score(29.9), Recommendation::StrongSell);
        assert_eq!(Recommendation::from_total_score(30.0), Recommendation::Sell);
        assert_eq!(Recommendation::from_total_score(59.99), Recommendation::Hold);
        assert_eq!(Recommendation::from_total_score(74.68), Recommendation::Buy);
        assert_eq!(Recommendation::from_total_score(80.0), Recommendation::StrongBuy);
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert_eq!("hold".parse::<TradeAction>().unwrap(), TradeAction::Hold);
        assert!("liquidate".parse::<TradeAction>().is_err());
        assert_eq!("critical".parse::<Priority>().unwrap().rank(), 1);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn composite_score_is_clamped() {
        let c = CompositeScore::new(130.0, 1.5);
        assert!((c.score - 100.0).abs() < f64::EPSILON);
        assert!((c.confidence - 1.0).abs() < f64::EPSILON);
    }
}
