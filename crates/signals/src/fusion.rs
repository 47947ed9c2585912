//! Model fusion engine.
//!
//! Reconciles the v2, sentiment and improved model scores into one composite
//! score. The weighting regime is chosen by how much the models agree, and
//! an admission filter decides whether the fused score is trustworthy enough
//! to act on.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tradegate_core::model::clamp_unit;
use tradegate_core::{CompositeScore, FusionConfig, ModelKind, ModelScore, Recommendation};

// =============================================================================
// Admission filter thresholds
// =============================================================================

const SHORT_TERM_HIGH: f64 = 0.5;
const SHORT_TERM_MID: f64 = 0.45;
const SHORT_TERM_OK: f64 = 0.4;
const V2_GOOD: f64 = 0.5;
const V2_EXCELLENT: f64 = 0.6;
const V2_SUPERIOR: f64 = 0.7;
const HIGH_CONSISTENCY: f64 = 0.7;
const FINAL_SCORE_HIGH: f64 = 0.4;

pub const FALLBACK_STRATEGY: &str = "single-model-fallback";

/// Weighting regime selected by model consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightRegime {
    /// consistency > 0.8: v2 0.4, sentiment 0.3, improved 0.3
    HighConsistency,
    /// consistency > 0.6: v2 0.35, sentiment 0.35, improved 0.3
    MediumConsistency,
    /// Models disagree: plain mean of the three.
    Equal,
}

impl WeightRegime {
    /// High above 0.8, medium above 0.6, equal otherwise.
    #[must_use]
    pub fn for_consistency(consistency: f64) -> Self {
        if consistency > 0.8 {
            Self::HighConsistency
        } else if consistency > 0.6 {
            Self::MediumConsistency
        } else {
            Self::Equal
        }
    }

    /// Weights as `(v2, sentiment, improved)`.
    #[must_use]
    pub const fn weights(self) -> (f64, f64, f64) {
        match self {
            Self::HighConsistency => (0.4, 0.3, 0.3),
            Self::MediumConsistency => (0.35, 0.35, 0.3),
            Self::Equal => (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0),
        }
    }

    /// Short name used in logs and audit strings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HighConsistency => "high consistency",
            Self::MediumConsistency => "medium consistency",
            Self::Equal => "low consistency (mean)",
        }
    }
}

/// The admission-filter branch that accepted a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterBranch {
    /// Either short-term model high and v2 good.
    ShortTermHighV2Good,
    /// Both short-term models moderate and v2 excellent.
    DualShortTermV2Excellent,
    /// v2 superior and either short-term model acceptable.
    V2SuperiorShortTermOk,
    /// Models agree and the fused score is high enough.
    HighConsistency,
}

impl FilterBranch {
    /// Short name used in logs and audit strings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ShortTermHighV2Good => "short-term high + v2 good",
            Self::DualShortTermV2Excellent => "dual short-term moderate + v2 excellent",
            Self::V2SuperiorShortTermOk => "v2 superior + short-term ok",
            Self::HighConsistency => "high consistency + solid composite",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub passed: bool,
    pub branch: Option<FilterBranch>,
    /// Human-readable audit line; lists every input value on a miss.
    pub details: String,
}

/// Scores placed in the three fusion slots. Absent models stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusionSlots {
    pub v2: Option<f64>,
    pub sentiment: Option<f64>,
    pub improved: Option<f64>,
}

impl FusionSlots {
    /// Places each score in its slot, clamped to `[0, 1]`. The improved slot
    /// prefers v35 over refined.
    #[must_use]
    pub fn from_scores(scores: &[ModelScore]) -> Self {
        let find = |kind: ModelKind| {
            scores
                .iter()
                .find(|s| s.model == kind)
                .map(|s| clamp_unit(s.score))
        };
        Self {
            v2: find(ModelKind::V2),
            sentiment: find(ModelKind::Sentiment),
            improved: find(ModelKind::ImprovedRefinedV35).or_else(|| find(ModelKind::ImprovedRefined)),
        }
    }

    /// Number of slots that received a score.
    #[must_use]
    pub fn available(&self) -> usize {
        [self.v2, self.sentiment, self.improved]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// Scores of the filled slots, in v2, sentiment, improved order.
    #[must_use]
    pub fn present_scores(&self) -> Vec<f64> {
        [self.v2, self.sentiment, self.improved]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Labels of the empty slots.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.v2.is_none() {
            missing.push("v2");
        }
        if self.sentiment.is_none() {
            missing.push("sentiment");
        }
        if self.improved.is_none() {
            missing.push("improved");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub code: Option<String>,
    /// Fused score in `[0, 1]`.
    pub final_score: f64,
    pub consistency: f64,
    /// Label of the admission branch (or fallback) that produced this result.
    pub strategy_name: String,
    pub weighting: WeightRegime,
    pub model_scores: Vec<ModelScore>,
    pub missing_models: Vec<String>,
    /// `final_score * 100`.
    pub total_score: f64,
    pub recommendation: Recommendation,
    pub passed_filter: bool,
    pub filter_details: String,
}

impl FusionResult {
    /// The 0–100 score consumed by the decision engine, with consistency as confidence.
    #[must_use]
    pub fn composite(&self) -> CompositeScore {
        CompositeScore::new(self.total_score, self.consistency)
    }

    /// True when this result came from the single-model fallback.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.strategy_name == FALLBACK_STRATEGY
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelFusionEngine {
    config: FusionConfig,
}

impl ModelFusionEngine {
    #[must_use]
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Agreement among scores: `1 - 2 * variance`, clamped to `[0, 1]`.
    ///
    /// Fewer than two scores are perfectly consistent by definition. A
    /// non-finite variance (NaN or infinite input) counts as no agreement.
    #[must_use]
    pub fn calculate_consistency(scores: &[f64]) -> f64 {
        if scores.len() < 2 {
            return 1.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        if !variance.is_finite() {
            warn!(?scores, "Non-finite score variance, consistency set to 0");
            return 0.0;
        }
        let consistency = (1.0 - variance * 2.0).clamp(0.0, 1.0);

        debug!(mean, variance, consistency, "Consistency computed");
        consistency
    }

    /// Fused score in `[0, 1]`: regime-weighted base times `0.8 + 0.2 * consistency`.
    #[must_use]
    pub fn calculate_final_score(sentiment: f64, improved: f64, v2: f64, consistency: f64) -> f64 {
        let regime = WeightRegime::for_consistency(consistency);
        let (w_v2, w_sentiment, w_improved) = regime.weights();
        let base = v2 * w_v2 + sentiment * w_sentiment + improved * w_improved;
        let final_score = base * (0.8 + 0.2 * consistency);

        debug!(regime = regime.label(), base, final_score, "Final score computed");
        if final_score.is_nan() {
            0.0
        } else {
            final_score.clamp(0.0, 1.0)
        }
    }

    /// Admits a candidate when any of the four branches holds. Thresholds are inclusive.
    #[must_use]
    pub fn apply_filter_strategies(
        sentiment: f64,
        improved: f64,
        v2: f64,
        final_score: f64,
        consistency: f64,
    ) -> FilterOutcome {
        let branch = if (sentiment >= SHORT_TERM_HIGH || improved >= SHORT_TERM_HIGH) && v2 >= V2_GOOD {
            Some(FilterBranch::ShortTermHighV2Good)
        } else if sentiment >= SHORT_TERM_MID && improved >= SHORT_TERM_MID && v2 >= V2_EXCELLENT {
            Some(FilterBranch::DualShortTermV2Excellent)
        } else if v2 >= V2_SUPERIOR && (sentiment >= SHORT_TERM_OK || improved >= SHORT_TERM_OK) {
            Some(FilterBranch::V2SuperiorShortTermOk)
        } else if consistency >= HIGH_CONSISTENCY && final_score >= FINAL_SCORE_HIGH {
            Some(FilterBranch::HighConsistency)
        } else {
            None
        };

        match branch {
            Some(FilterBranch::HighConsistency) => FilterOutcome {
                passed: true,
                branch,
                details: format!(
                    "{} (consistency:{consistency:.2}/final:{final_score:.2})",
                    FilterBranch::HighConsistency.label()
                ),
            },
            Some(b) => FilterOutcome {
                passed: true,
                branch,
                details: format!("{} (S:{sentiment:.2}/I:{improved:.2}/V2:{v2:.2})", b.label()),
            },
            None => FilterOutcome {
                passed: false,
                branch: None,
                details: format!(
                    "filtered out (S:{sentiment:.2}/I:{improved:.2}/V2:{v2:.2}/consistency:{consistency:.2}/final:{final_score:.2})"
                ),
            },
        }
    }

    /// Fuses whatever models answered. Missing slots count as 0.0 in the
    /// weighted math but are excluded from the consistency measure and listed
    /// in `missing_models`.
    #[must_use]
    pub fn fuse(&self, scores: &[ModelScore], code: Option<&str>) -> FusionResult {
        let slots = FusionSlots::from_scores(scores);
        let missing: Vec<String> = slots.missing().into_iter().map(String::from).collect();

        if slots.available() < self.config.min_models_required {
            warn!(
                code = code.unwrap_or("-"),
                available = slots.available(),
                missing = %missing.join(","),
                "Insufficient model sources for fusion"
            );
        }

        let v2 = slots.v2.unwrap_or(0.0);
        let sentiment = slots.sentiment.unwrap_or(0.0);
        let improved = slots.improved.unwrap_or(0.0);

        let consistency = Self::calculate_consistency(&slots.present_scores());
        let weighting = WeightRegime::for_consistency(consistency);
        let final_score = Self::calculate_final_score(sentiment, improved, v2, consistency);
        let outcome = Self::apply_filter_strategies(sentiment, improved, v2, final_score, consistency);

        let total_score = final_score * 100.0;
        let recommendation = Recommendation::from_total_score(total_score);

        let mut filter_details = outcome.details.clone();
        if !missing.is_empty() {
            filter_details.push_str(&format!(" [n/a: {}]", missing.join(",")));
        }

        info!(
            code = code.unwrap_or("-"),
            total_score = %format!("{total_score:.2}"),
            consistency = %format!("{consistency:.2}"),
            strategy = %outcome.details,
            passed = outcome.passed,
            "Fusion complete"
        );

        FusionResult {
            code: code.map(String::from),
            final_score,
            consistency,
            strategy_name: outcome
                .branch
                .map_or_else(|| "none".to_string(), |b| b.label().to_string()),
            weighting,
            model_scores: scores.to_vec(),
            missing_models: missing,
            total_score,
            recommendation,
            passed_filter: outcome.passed,
            filter_details,
        }
    }

    /// Degraded result built from one model: consistency 1.0 and no filtering.
    /// The score is clamped to `[0, 1]` before grading.
    #[must_use]
    pub fn single_model_fallback(&self, score: &ModelScore, code: Option<&str>) -> FusionResult {
        let final_score = clamp_unit(score.score);
        let total_score = final_score * 100.0;
        info!(
            code = code.unwrap_or("-"),
            model = %score.model,
            total_score = %format!("{total_score:.2}"),
            "Using single-model fallback"
        );

        FusionResult {
            code: code.map(String::from),
            final_score,
            consistency: 1.0,
            strategy_name: FALLBACK_STRATEGY.to_string(),
            weighting: WeightRegime::HighConsistency,
            model_scores: vec![score.clone()],
            missing_models: Vec::new(),
            total_score,
            recommendation: Recommendation::from_total_score(total_score),
            passed_filter: true,
            filter_details: format!("{} only, filter skipped", score.model),
        }
    }

    /// Fuses when enough sources answered, otherwise degrades to the fallback model.
    ///
    /// Returns `None` when the fallback model is absent too.
    #[must_use]
    pub fn fuse_or_fallback(&self, scores: &[ModelScore], code: Option<&str>) -> Option<FusionResult> {
        let slots = FusionSlots::from_scores(scores);
        if self.config.enabled && slots.available() >= self.config.min_models_required {
            return Some(self.fuse(scores, code));
        }

        if self.config.enabled {
            warn!(
                code = code.unwrap_or("-"),
                available = slots.available(),
                required = self.config.min_models_required,
                "Not enough models, degrading to fallback model"
            );
        }

        let fallback = self.config.fallback_model;
        let found = scores.iter().find(|s| {
            s.model == fallback || (fallback.is_improved() && s.model.is_improved())
        });
        match found {
            Some(score) => Some(self.single_model_fallback(score, code)),
            None => {
                warn!(code = code.unwrap_or("-"), model = %fallback, "Fallback model unavailable");
                None
            }
        }
    }
}
