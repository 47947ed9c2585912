use serde::Serialize;

use tradegate_core::{RiskLevel, TradeRecord};

/// Why a signal did not turn into a trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    /// Rejected by the risk manager.
    Risk { level: RiskLevel, errors: Vec<String> },
    /// Failed buy-signal validation against the live quote.
    Invalid { errors: Vec<String> },
    /// The executor reported no fill.
    Unfilled,
    /// No held position matched the signal.
    UnknownPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub code: String,
    pub reason: SkipReason,
}

/// Outcome of one sell or buy pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    /// Set when an active circuit breaker stopped the pass.
    pub halted: bool,
    pub signals: usize,
    pub executed: Vec<TradeRecord>,
    pub skipped: Vec<Skipped>,
}

impl PassReport {
    #[must_use]
    pub fn halted() -> Self {
        Self {
            halted: true,
            ..Self::default()
        }
    }

    pub fn skip(&mut self, code: impl Into<String>, reason: SkipReason) {
        self.skipped.push(Skipped {
            code: code.into(),
            reason,
        });
    }
}
