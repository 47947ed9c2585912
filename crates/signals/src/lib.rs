//! Signal layer: model fusion and per-position trade decisions.

pub mod decision;
pub mod fusion;

pub use decision::{Decision, DecisionEngine, SubSignals};
pub use fusion::{
    FilterBranch, FilterOutcome, FusionResult, FusionSlots, ModelFusionEngine, WeightRegime,
    FALLBACK_STRATEGY,
};
