//! Buy-side types flowing from candidate selection to execution.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::is_st_name;
use crate::signal::Priority;

/// A stock eligible for a new position, scored on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStock {
    pub code: String,
    pub name: String,
    pub score: f64,
    pub price: Decimal,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl CandidateStock {
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, score: f64, price: Decimal) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            score,
            price,
            reasons: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

/// A sized allocation for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyRecommendation {
    pub code: String,
    pub name: String,
    pub score: f64,
    pub price: Decimal,
    /// Shares, always a multiple of the lot size.
    pub quantity: u64,
    pub amount: Decimal,
    /// Amount over total capital.
    pub position_ratio: f64,
    pub reasons: Vec<String>,
}

/// A buy order ready for risk approval and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuySignal {
    pub stock_code: String,
    pub stock_name: String,
    pub price: Decimal,
    pub quantity: u64,
    pub amount: Decimal,
    pub score: f64,
    pub priority: Priority,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl BuySignal {
    #[must_use]
    pub fn is_st(&self) -> bool {
        is_st_name(&self.stock_name)
    }
}
