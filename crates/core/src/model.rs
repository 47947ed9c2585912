//! Predictive model identifiers and per-model scores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Known predictive model sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    V2,
    Sentiment,
    ImprovedRefined,
    ImprovedRefinedV35,
}

impl ModelKind {
    pub const ALL: [Self; 4] = [
        Self::V2,
        Self::Sentiment,
        Self::ImprovedRefined,
        Self::ImprovedRefinedV35,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::Sentiment => "sentiment",
            Self::ImprovedRefined => "improved_refined",
            Self::ImprovedRefinedV35 => "improved_refined_v35",
        }
    }

    /// Both refined variants fill the same "improved" fusion slot.
    #[must_use]
    pub const fn is_improved(self) -> bool {
        matches!(self, Self::ImprovedRefined | Self::ImprovedRefinedV35)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("model", s))
    }
}

/// Normalized output of a single predictive model for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: ModelKind,
    /// Normalized score in `[0, 1]`.
    pub score: f64,
    /// Model-reported confidence in `[0, 1]`.
    pub confidence: f64,
    /// Untouched response body for auditing.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl ModelScore {
    /// Creates a score, clamping out-of-range input into `[0, 1]`.
    #[must_use]
    pub fn new(model: ModelKind, score: f64) -> Self {
        let clamped = clamp_unit(score);
        if (clamped - score).abs() > f64::EPSILON || score.is_nan() {
            tracing::warn!(model = %model, score, "Model score outside [0, 1], clamped");
        }
        Self {
            model,
            score: clamped,
            confidence: 1.0,
            raw: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    #[must_use]
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Clamps to `[0, 1]`, mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
