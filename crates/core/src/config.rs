//! Configuration context shared by every pipeline component.
//!
//! A single [`TradingConfig`] is built once (defaults, TOML, env) and passed
//! by reference into each component constructor.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::ModelKind;

/// Root configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub fusion: FusionConfig,
    pub decision: DecisionConfig,
    pub risk: RiskConfig,
    pub buy: BuyConfig,
    pub portfolio: PortfolioConfig,
    pub session: SessionConfig,
}

// =============================================================================
// Fusion
// =============================================================================

/// Degradation policy for model fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// When false every symbol is scored by the fallback model alone.
    pub enabled: bool,
    /// Fewer available model sources than this triggers the single-model fallback.
    pub min_models_required: usize,
    /// Model used for the single-model fallback.
    pub fallback_model: ModelKind,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_models_required: 2,
            fallback_model: ModelKind::V2,
        }
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Weights of the four decision sub-signals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionWeights {
    pub model: f64,
    pub market: f64,
    pub profit_loss: f64,
    pub holding: f64,
}

impl Default for DecisionWeights {
    fn default() -> Self {
        Self {
            model: 0.5,
            market: 0.2,
            profit_loss: 0.2,
            holding: 0.1,
        }
    }
}

/// Thresholds used by the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Loss ratio at or below which the stop-loss fires (e.g. -0.10).
    pub stop_loss: f64,
    /// Gain ratio at or above which profit is taken (e.g. 0.20).
    pub take_profit: f64,
    /// Loss ratio at or below which the emergency stop fires (e.g. -0.15).
    pub emergency_stop_loss: f64,
    /// Lower edge of the "small loss" band.
    pub small_loss_floor: f64,
    pub holding_days_warning: u32,
    pub holding_days_long: u32,
    /// Holdings younger than this many days count as short-term.
    pub short_holding_days: u32,
    pub weights: DecisionWeights,
    /// Codes that are always force-sold.
    pub blacklist: Vec<String>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            stop_loss: -0.10,
            take_profit: 0.20,
            emergency_stop_loss: -0.15,
            small_loss_floor: -0.05,
            holding_days_warning: 3,
            holding_days_long: 10,
            short_holding_days: 5,
            weights: DecisionWeights::default(),
            blacklist: Vec::new(),
        }
    }
}

impl DecisionConfig {
    /// Returns true if the code is on the deny-list.
    #[must_use]
    pub fn is_blacklisted(&self, code: &str) -> bool {
        self.blacklist.iter().any(|c| c == code)
    }
}

// =============================================================================
// Risk
// =============================================================================

/// Limits enforced by the risk manager for every trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_daily_trades: u32,
    /// Position value over portfolio value above which a warning is raised.
    pub max_position_ratio: f64,
    #[serde(with = "duration_secs")]
    pub min_trade_interval: Duration,
    pub max_single_trade_amount: Decimal,
    pub min_trade_amount: Decimal,
    /// Realized daily loss over capital that trips the circuit breaker (0.05 = 5%).
    pub daily_loss_limit: f64,
    #[serde(with = "duration_secs")]
    pub circuit_breaker_cooldown: Duration,
    /// Max share of the portfolio held in ST names.
    pub st_max_ratio: f64,
    /// Loss-ratio denominator used when the caller supplies no portfolio value.
    pub reference_capital: Decimal,
    /// Fraction of a cap at which a "near limit" warning is emitted.
    pub warning_fraction: f64,
    /// Days of journal history loaded at start-up.
    pub history_days: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_trades: 20,
            max_position_ratio: 0.3,
            min_trade_interval: Duration::from_secs(15),
            max_single_trade_amount: dec!(12000),
            min_trade_amount: dec!(4000),
            daily_loss_limit: 0.05,
            circuit_breaker_cooldown: Duration::from_secs(3600),
            st_max_ratio: 0.1,
            reference_capital: dec!(100000),
            warning_fraction: 0.8,
            history_days: 7,
        }
    }
}

// =============================================================================
// Buying
// =============================================================================

/// Limits shared by buy-side risk checks and portfolio sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyConfig {
    pub max_daily_buy_count: u32,
    #[serde(with = "duration_secs")]
    pub min_buy_interval: Duration,
    pub max_positions: usize,
    /// Max value of one holding as a share of total capital.
    pub max_single_position: f64,
    /// Max share of capital opened as new positions in one day.
    pub max_new_position_ratio: f64,
    pub min_position_value: Decimal,
    pub cash_reserve_ratio: f64,
    /// Extra cash required on top of a buy amount (0.05 = 5%).
    pub cash_safety_buffer: f64,
    /// Max buy signals emitted per pass.
    pub max_buy_count: usize,
}

impl Default for BuyConfig {
    fn default() -> Self {
        Self {
            max_daily_buy_count: 5,
            min_buy_interval: Duration::from_secs(60),
            max_positions: 10,
            max_single_position: 0.2,
            max_new_position_ratio: 0.5,
            min_position_value: dec!(5000),
            cash_reserve_ratio: 0.1,
            cash_safety_buffer: 0.05,
            max_buy_count: 5,
        }
    }
}

// =============================================================================
// Portfolio
// =============================================================================

/// Assumptions behind fractional Kelly sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    pub assumed_win_return: f64,
    /// Negative return assumed on a losing trade.
    pub assumed_loss_return: f64,
    pub max_win_probability: f64,
    /// Upper clamp on the full Kelly fraction.
    pub max_fraction: f64,
    /// Safety divisor (4 = quarter Kelly).
    pub divisor: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            assumed_win_return: 0.15,
            assumed_loss_return: -0.08,
            max_win_probability: 0.9,
            max_fraction: 0.25,
            divisor: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub total_capital: Decimal,
    pub max_industry_concentration: f64,
    pub lot_size: u32,
    pub kelly: KellyConfig,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            total_capital: dec!(100000),
            max_industry_concentration: 0.4,
            lot_size: 100,
            kelly: KellyConfig::default(),
        }
    }
}

// =============================================================================
// Trading session
// =============================================================================

/// Inclusive wall-clock window in exchange local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    #[must_use]
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Continuous-trading sessions and the call-auction windows to avoid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sessions: Vec<TimeWindow>,
    pub avoid: Vec<TimeWindow>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sessions: vec![
                TimeWindow::new(hm(9, 30), hm(11, 30)),
                TimeWindow::new(hm(13, 0), hm(15, 0)),
            ],
            avoid: vec![
                TimeWindow::new(hm(9, 15), hm(9, 25)),
                TimeWindow::new(hm(14, 57), hm(15, 0)),
            ],
        }
    }
}

// =============================================================================
// Serde support for Duration
// =============================================================================

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_limits() {
        let config = TradingConfig::default();
        assert_eq!(config.risk.max_daily_trades, 20);
        assert_eq!(config.risk.min_trade_interval, Duration::from_secs(15));
        assert_eq!(config.risk.circuit_breaker_cooldown, Duration::from_secs(3600));
        assert_eq!(config.buy.min_position_value, dec!(5000));
        assert_eq!(config.portfolio.lot_size, 100);
        assert!((config.decision.weights.model - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(RiskConfig::default()).unwrap();
        assert_eq!(json["min_trade_interval"], 15);
        assert_eq!(json["circuit_breaker_cooldown"], 3600);
    }

    #[test]
    fn partial_section_falls_back_to_defaults() {
        let risk: RiskConfig = serde_json::from_str(r#"{"max_daily_trades": 3}"#).unwrap();
        assert_eq!(risk.max_daily_trades, 3);
        assert_eq!(risk.min_trade_interval, Duration::from_secs(15));
    }

    #[test]
    fn time_window_is_inclusive() {
        let w = TimeWindow::new(hm(9, 30), hm(11, 30));
        assert!(w.contains(hm(9, 30)));
        assert!(w.contains(hm(11, 30)));
        assert!(!w.contains(hm(11, 31)));
    }
}
