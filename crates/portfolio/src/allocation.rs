//! Allocation policies and lot rounding.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PortfolioError;

/// Policy used to split available cash across candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// Same cash for every candidate.
    EqualWeight,
    /// Cash proportional to score, capped per symbol.
    #[default]
    ScoreWeighted,
    /// Quarter Kelly per candidate, allocated sequentially from a running balance.
    FractionalKelly,
}

impl AllocationMethod {
    /// Canonical snake_case label, matching the serde form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EqualWeight => "equal_weight",
            Self::ScoreWeighted => "score_weighted",
            Self::FractionalKelly => "fractional_kelly",
        }
    }
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical labels plus the short forms `equal`, `score` and
/// `kelly`, case-insensitively.
impl FromStr for AllocationMethod {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" | "equal_weight" => Ok(Self::EqualWeight),
            "score" | "score_weighted" => Ok(Self::ScoreWeighted),
            "kelly" | "fractional_kelly" => Ok(Self::FractionalKelly),
            other => Err(PortfolioError::UnknownMethod(other.to_string())),
        }
    }
}

/// Whole lots affordable with `cash`, expressed in shares.
///
/// Zero for a non-positive price, cash or lot size.
#[must_use]
pub fn shares_for(price: Decimal, cash: Decimal, lot_size: u32) -> u64 {
    if price <= Decimal::ZERO || cash <= Decimal::ZERO || lot_size == 0 {
        return 0;
    }
    let lot = Decimal::from(lot_size);
    let lots = (cash / (price * lot)).floor().to_u64().unwrap_or(0);
    lots * u64::from(lot_size)
}
