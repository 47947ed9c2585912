//! Fractional Kelly sizing for equity candidates.
//!
//! A candidate's 0–100 score stands in for its win probability; the payoff
//! on a win or a loss is a fixed assumption from [`KellyConfig`].

use serde::{Deserialize, Serialize};
use tradegate_core::KellyConfig;

/// Kelly sizer over fixed win/loss return assumptions.
///
/// ```text
/// f* = (p·b − q·|l|) / b
/// ```
///
/// with `p` the win probability, `q = 1 − p`, `b` the assumed win return and
/// `l` the assumed loss return. `f*` is clamped to `[0, max_fraction]` and
/// then divided by the safety divisor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KellySizer {
    pub config: KellyConfig,
}

/// Result of sizing one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellyDecision {
    pub win_probability: f64,
    /// Clamped full Kelly fraction, before the divisor.
    pub full_fraction: f64,
    /// Fraction of capital actually committed.
    pub applied_fraction: f64,
    pub reason: KellyReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KellyReason {
    /// Positive expected edge.
    PositiveEdge,
    /// Expected value at or below zero; nothing allocated.
    NoEdge,
    /// Probability or return assumptions out of range.
    InvalidInputs,
}

impl KellySizer {
    #[must_use]
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    /// Win probability assumed for a 0–100 score.
    #[must_use]
    pub fn win_probability(&self, score: f64) -> f64 {
        (score / 100.0).min(self.config.max_win_probability)
    }

    /// Clamped full Kelly fraction for a win probability.
    #[must_use]
    pub fn full_fraction(&self, win_prob: f64) -> f64 {
        let b = self.config.assumed_win_return;
        let loss = self.config.assumed_loss_return;
        if win_prob <= 0.0 || win_prob >= 1.0 || b <= 0.0 || loss >= 0.0 {
            return 0.0;
        }
        let q = 1.0 - win_prob;
        let raw = (win_prob * b - q * loss.abs()) / b;
        raw.clamp(0.0, self.config.max_fraction)
    }

    /// Sizes a candidate from its score.
    ///
    /// # Examples
    /// ```
    /// use tradegate_portfolio::kelly::{KellyReason, KellySizer};
    ///
    /// let sizer = KellySizer::default();
    /// let decision = sizer.size(80.0);
    ///
    /// // 80% win probability saturates the 25% cap, quarter Kelly applied
    /// assert_eq!(decision.reason, KellyReason::PositiveEdge);
    /// assert!((decision.applied_fraction - 0.0625).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn size(&self, score: f64) -> KellyDecision {
        let win_probability = self.win_probability(score);
        let valid = win_probability > 0.0
            && win_probability < 1.0
            && self.config.assumed_win_return > 0.0
            && self.config.assumed_loss_return < 0.0
            && self.config.divisor > 0.0;
        if !valid {
            return KellyDecision {
                win_probability,
                full_fraction: 0.0,
                applied_fraction: 0.0,
                reason: KellyReason::InvalidInputs,
            };
        }

        let full_fraction = self.full_fraction(win_probability);
        if full_fraction <= 0.0 {
            return KellyDecision {
                win_probability,
                full_fraction: 0.0,
                applied_fraction: 0.0,
                reason: KellyReason::NoEdge,
            };
        }

        KellyDecision {
            win_probability,
            full_fraction,
            applied_fraction: full_fraction / self.config.divisor,
            reason: KellyReason::PositiveEdge,
        }
    }
}
