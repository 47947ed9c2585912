//! Decision engine for held positions.
//!
//! Blends four independent sub-signals in `[-1, 1]` (model score, market
//! action, profit/loss and holding time) into one graded [`TradeSignal`].
//! A sub-signal whose inputs are missing is skipped and the remaining
//! weights are renormalized.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use tradegate_core::money::to_f64;
use tradegate_core::signal::urgency_order;
use tradegate_core::{
    Clock, CompositeScore, DecisionConfig, Position, Priority, StockData, SystemClock,
    TradeAction, TradeSignal,
};

/// Sub-signal values; `None` when the inputs were unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubSignals {
    pub model: Option<f64>,
    pub market: Option<f64>,
    pub profit_loss: Option<f64>,
    pub holding: Option<f64>,
}

/// Final decision bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: TradeAction,
    pub priority: Priority,
    pub confidence: f64,
    /// Renormalized weighted score in `[-1, 1]`.
    pub score: f64,
}

impl Decision {
    /// Maps a normalized score to action, priority and capped confidence.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        let magnitude = score.abs();
        let (action, priority, confidence) = if score < -0.7 {
            (TradeAction::StrongSell, Priority::Critical, magnitude.min(0.95))
        } else if score < -0.5 {
            (TradeAction::Sell, Priority::High, (magnitude * 0.9).min(0.85))
        } else if score < -0.15 {
            (TradeAction::Sell, Priority::Medium, (magnitude * 0.8).min(0.8))
        } else if score < 0.15 {
            (TradeAction::Hold, Priority::Low, 0.5)
        } else {
            (TradeAction::Buy, Priority::Low, score.min(0.8))
        };

        Self {
            action,
            priority,
            confidence,
            score,
        }
    }
}

pub struct DecisionEngine {
    config: DecisionConfig,
    clock: Arc<dyn Clock>,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Analyzes one holding.
    ///
    /// When market data is present its price replaces the position's current
    /// price for the analysis. Deny-listed codes short-circuit to a critical
    /// strong sell.
    #[must_use]
    pub fn analyze_position(
        &self,
        position: &Position,
        market: Option<&StockData>,
        model: Option<&CompositeScore>,
    ) -> TradeSignal {
        let mut position = position.clone();
        if let Some(quote) = market {
            position.current_price = Some(quote.current_price);
        }
        let price = market.map(|q| q.current_price);

        if self.config.is_blacklisted(&position.code) {
            info!(code = %position.code, "Blacklisted holding, forcing sell");
            return TradeSignal {
                stock_code: position.code.clone(),
                stock_name: position.name.clone(),
                action: TradeAction::StrongSell,
                priority: Priority::Critical,
                quantity: position.quantity,
                price,
                reasons: vec!["code is blacklisted, forced sell".to_string()],
                score: model.map(|m| m.score),
                confidence: 1.0,
                timestamp: self.clock.now(),
            };
        }

        let mut reasons = Vec::new();
        let subs = SubSignals {
            model: model.map(|m| self.model_signal(m, &mut reasons)),
            market: market.map(|q| Self::market_signal(q, &mut reasons)),
            profit_loss: self.profit_loss_signal(&position, &mut reasons),
            holding: self.holding_signal(&position, &mut reasons),
        };
        debug!(code = %position.code, ?subs, "Sub-signals");

        let decision = self.decide(&subs);

        info!(
            code = %position.code,
            name = %position.name,
            action = %decision.action,
            priority = %decision.priority,
            confidence = %format!("{:.2}", decision.confidence),
            "Position analysis complete"
        );

        TradeSignal {
            stock_code: position.code,
            stock_name: position.name,
            action: decision.action,
            priority: decision.priority,
            quantity: position.quantity,
            price,
            reasons,
            score: model.map(|m| m.score),
            confidence: decision.confidence,
            timestamp: self.clock.now(),
        }
    }

    /// Analyzes every position, looking up quotes and scores by code.
    /// The result is sorted most urgent first.
    #[must_use]
    pub fn analyze_positions_batch(
        &self,
        positions: &[Position],
        market: &HashMap<String, StockData>,
        scores: &HashMap<String, CompositeScore>,
    ) -> Vec<TradeSignal> {
        let mut signals: Vec<TradeSignal> = positions
            .iter()
            .map(|p| self.analyze_position(p, market.get(&p.code), scores.get(&p.code)))
            .collect();
        signals.sort_by(urgency_order);
        signals
    }

    /// Keeps sell signals only, most urgent first.
    #[must_use]
    pub fn filter_sell_signals(signals: &[TradeSignal]) -> Vec<TradeSignal> {
        let mut sells: Vec<TradeSignal> = signals.iter().filter(|s| s.is_sell()).cloned().collect();
        sells.sort_by(urgency_order);
        info!(count = sells.len(), "Sell signals filtered");
        sells
    }

    // =========================================================================
    // Sub-signals
    // =========================================================================

    /// Buckets the 0–100 composite score. The two sell buckets keep a minimum
    /// magnitude so low confidence cannot erase a clear sell.
    pub fn model_signal(&self, model: &CompositeScore, reasons: &mut Vec<String>) -> f64 {
        let score = model.score;
        let confidence = model.confidence;

        if score < 30.0 {
            reasons.push(format!("model score very low ({score:.1}/100), strong sell"));
            (-1.0 * confidence).min(-0.5)
        } else if score < 40.0 {
            reasons.push(format!("model score low ({score:.1}/100), sell"));
            (-0.7 * confidence).min(-0.4)
        } else if score < 60.0 {
            reasons.push(format!("model score neutral ({score:.1}/100), hold and watch"));
            -0.3 * confidence
        } else if score < 80.0 {
            reasons.push(format!("model score good ({score:.1}/100), keep holding"));
            0.3 * confidence
        } else {
            reasons.push(format!("model score excellent ({score:.1}/100), keep holding"));
            0.8 * confidence
        }
    }

    pub fn market_signal(quote: &StockData, reasons: &mut Vec<String>) -> f64 {
        let mut signal = 0.0;

        if quote.is_limit_down() {
            reasons.push(format!("limit down ({})", quote.current_price));
            signal -= 0.8;
        } else if quote.is_limit_up() {
            reasons.push(format!("limit up ({}), keep holding", quote.current_price));
            signal += 0.5;
        } else {
            let position = quote.price_position();
            if position < 0.2 {
                reasons.push(format!("price near intraday low ({:.1}%)", position * 100.0));
                signal -= 0.3;
            } else if position > 0.8 {
                reasons.push(format!("price near intraday high ({:.1}%)", position * 100.0));
                signal += 0.2;
            }
        }

        if quote.change_percent < -5.0 {
            reasons.push(format!("sharp drop ({:+.2}%)", quote.change_percent));
            signal -= 0.5;
        } else if quote.change_percent > 5.0 {
            reasons.push(format!("sharp rise ({:+.2}%)", quote.change_percent));
            signal += 0.3;
        }

        f64::clamp(signal, -1.0, 1.0)
    }

    /// `None` unless both prices are known and positive.
    pub fn profit_loss_signal(&self, position: &Position, reasons: &mut Vec<String>) -> Option<f64> {
        let ratio = position.profit_loss_ratio()?;
        let amount = position.profit_loss().map_or(0.0, to_f64);

        let signal = if ratio <= self.config.emergency_stop_loss {
            reasons.push(format!(
                "emergency stop-loss hit ({:.2}%, loss {:.2})",
                ratio * 100.0,
                amount.abs()
            ));
            -1.0
        } else if ratio <= self.config.stop_loss {
            reasons.push(format!(
                "stop-loss hit ({:.2}%, loss {:.2})",
                ratio * 100.0,
                amount.abs()
            ));
            -0.8
        } else if ratio >= self.config.take_profit {
            // Taking profit is a sell trigger.
            reasons.push(format!(
                "take-profit reached ({:.2}%, gain {:.2})",
                ratio * 100.0,
                amount
            ));
            -0.6
        } else if ratio >= self.config.small_loss_floor && ratio < 0.0 {
            reasons.push(format!("small loss ({:.2}%)", ratio * 100.0));
            -0.3
        } else if ratio > 0.0 {
            reasons.push(format!("in profit ({:.2}%)", ratio * 100.0));
            0.2
        } else {
            0.0
        };

        Some(signal)
    }

    /// `None` when the holding period is unknown.
    pub fn holding_signal(&self, position: &Position, reasons: &mut Vec<String>) -> Option<f64> {
        let days = position.holding_days?;
        let losing = position.is_losing();

        let signal = if days >= self.config.holding_days_long && losing {
            reasons.push(format!("held {days} days at a loss, cut it"));
            -0.6
        } else if days >= self.config.holding_days_warning && losing {
            reasons.push(format!("held {days} days at a loss, watch closely"));
            -0.4
        } else if days < self.config.short_holding_days {
            reasons.push(format!("short holding ({days} days)"));
            0.1
        } else {
            0.0
        };

        Some(signal)
    }

    /// Weighted sum over the present sub-signals, renormalized by the weights used.
    #[must_use]
    pub fn decide(&self, subs: &SubSignals) -> Decision {
        let w = &self.config.weights;
        let parts = [
            (subs.model, w.model),
            (subs.market, w.market),
            (subs.profit_loss, w.profit_loss),
            (subs.holding, w.holding),
        ];

        let (weighted, total_weight) = parts
            .iter()
            .filter_map(|(value, weight)| value.map(|v| (v * weight, *weight)))
            .fold((0.0, 0.0), |(sum, tw), (v, w)| (sum + v, tw + w));

        let score = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            0.0
        };

        Decision::from_score(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{ModelFusionEngine, WeightRegime};
    use rust_decimal_macros::dec;
    use tradegate_core::{ModelKind, ModelScore, Recommendation};

    fn engine() -> DecisionEngine {
        DecisionEngine::new(DecisionConfig::default())
    }

    fn position(cost: rust_decimal::Decimal, price: rust_decimal::Decimal) -> Position {
        Position::new("600519", "Test Co", 1000, cost).with_current_price(price)
    }

    #[test]
    fn emergency_stop_alone_is_strong_sell() {
        // ratio = -0.16, only the profit/loss sub-signal engaged
        let signal = engine().analyze_position(&position(dec!(25), dec!(21)), None, None);
        assert_eq!(signal.action, TradeAction::StrongSell);
        assert_eq!(signal.priority, Priority::Critical);
        assert!((signal.confidence - 0.95).abs() < 1e-12);
        assert!(signal.price.is_none());
    }

    #[test]
    fn blacklist_short_circuits() {
        let config = DecisionConfig {
            blacklist: vec!["600519".to_string()],
            ..DecisionConfig::default()
        };
        let engine = DecisionEngine::new(config);
        let score = CompositeScore::new(95.0, 1.0);
        let signal = engine.analyze_position(&position(dec!(10), dec!(12)), None, Some(&score));
        assert_eq!(signal.action, TradeAction::StrongSell);
        assert_eq!(signal.priority, Priority::Critical);
        assert!((signal.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(signal.reasons.len(), 1);
    }

    #[test]
    fn sell_floors_survive_low_confidence() {
        let mut reasons = Vec::new();
        let e = engine();
        let strong = e.model_signal(&CompositeScore::new(20.0, 0.1), &mut reasons);
        assert!((strong + 0.5).abs() < 1e-12);
        let sell = e.model_signal(&CompositeScore::new(35.0, 0.1), &mut reasons);
        assert!((sell + 0.4).abs() < 1e-12);
        let confident = e.model_signal(&CompositeScore::new(20.0, 0.9), &mut reasons);
        assert!((confident + 0.9).abs() < 1e-12);
    }

    #[test]
    fn market_signal_limit_and_change() {
        let mut reasons = Vec::new();
        let limit_down = StockData::new("600519", dec!(9)).with_change_percent(-10.0);
        // -0.8 for the limit, -0.5 for the drop, clamped
        assert!((DecisionEngine::market_signal(&limit_down, &mut reasons) + 1.0).abs() < 1e-12);

        let near_low = StockData::new("600519", dec!(10.1))
            .with_range(dec!(11), dec!(10))
            .with_change_percent(-1.0);
        assert!((DecisionEngine::market_signal(&near_low, &mut reasons) + 0.3).abs() < 1e-12);

        let rally = StockData::new("300750", dec!(10.9))
            .with_range(dec!(11), dec!(10))
            .with_change_percent(6.0);
        assert!((DecisionEngine::market_signal(&rally, &mut reasons) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn take_profit_is_a_sell_trigger() {
        let mut reasons = Vec::new();
        let v = engine()
            .profit_loss_signal(&position(dec!(10), dec!(12.5)), &mut reasons)
            .unwrap();
        assert!((v + 0.6).abs() < 1e-12);
        assert!(reasons[0].contains("take-profit"));
    }

    #[test]
    fn gap_between_stop_and_small_loss_is_neutral() {
        let mut reasons = Vec::new();
        let v = engine()
            .profit_loss_signal(&position(dec!(10), dec!(9.3)), &mut reasons)
            .unwrap();
        assert!(v.abs() < f64::EPSILON);
        assert!(reasons.is_empty());
    }

    #[test]
    fn holding_signal_requires_days() {
        let mut reasons = Vec::new();
        let e = engine();
        assert!(e.holding_signal(&position(dec!(10), dec!(9)), &mut reasons).is_none());

        let long_loser = position(dec!(10), dec!(9)).with_holding_days(12);
        assert!((e.holding_signal(&long_loser, &mut reasons).unwrap() + 0.6).abs() < 1e-12);

        let warn_loser = position(dec!(10), dec!(9)).with_holding_days(4);
        assert!((e.holding_signal(&warn_loser, &mut reasons).unwrap() + 0.4).abs() < 1e-12);

        let fresh = position(dec!(10), dec!(11)).with_holding_days(2);
        assert!((e.holding_signal(&fresh, &mut reasons).unwrap() - 0.1).abs() < 1e-12);

        let mid = position(dec!(10), dec!(11)).with_holding_days(7);
        assert!(e.holding_signal(&mid, &mut reasons).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn weights_renormalize_over_present_signals() {
        let e = engine();
        let only_market = SubSignals {
            market: Some(-0.6),
            ..SubSignals::default()
        };
        let d = e.decide(&only_market);
        assert!((d.score + 0.6).abs() < 1e-12);
        assert_eq!(d.action, TradeAction::Sell);
        assert_eq!(d.priority, Priority::High);

        let none = e.decide(&SubSignals::default());
        assert_eq!(none.action, TradeAction::Hold);
    }

    #[test]
    fn decision_buckets_and_caps() {
        let d = Decision::from_score(-0.3);
        assert_eq!((d.action, d.priority), (TradeAction::Sell, Priority::Medium));
        assert!((d.confidence - 0.24).abs() < 1e-12);

        let d = Decision::from_score(0.1);
        assert_eq!((d.action, d.priority), (TradeAction::Hold, Priority::Low));
        assert!((d.confidence - 0.5).abs() < f64::EPSILON);

        let d = Decision::from_score(0.95);
        assert_eq!(d.action, TradeAction::Buy);
        assert!((d.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn market_data_refreshes_price() {
        let pos = Position::new("600519", "Test Co", 100, dec!(20)).with_current_price(dec!(30));
        let quote = StockData::new("600519", dec!(16.8));
        // 16.8 vs cost 20 is -16%, so the stale 30 must not be used
        let signal = engine().analyze_position(&pos, Some(&quote), None);
        assert!(signal.is_sell());
        assert_eq!(signal.price, Some(dec!(16.8)));
    }

    #[test]
    fn batch_sorted_and_sell_filter() {
        let positions = vec![
            Position::new("000001", "Gainer", 100, dec!(10)).with_current_price(dec!(10.5)),
            Position::new("000002", "Crash", 100, dec!(10)).with_current_price(dec!(8)),
            Position::new("000003", "Dip", 100, dec!(10)).with_current_price(dec!(9.8)),
        ];
        let e = engine();
        let signals = e.analyze_positions_batch(&positions, &HashMap::new(), &HashMap::new());
        assert_eq!(signals[0].stock_code, "000002");
        assert_eq!(signals[0].priority, Priority::Critical);

        let sells = DecisionEngine::filter_sell_signals(&signals);
        let codes: Vec<_> = sells.iter().map(|s| s.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["000002", "000003"]);
    }

    #[test]
    fn fused_agreement_with_mild_rally_is_low_priority_buy() {
        let fused = ModelFusionEngine::default().fuse(
            &[
                ModelScore::new(ModelKind::V2, 0.72),
                ModelScore::new(ModelKind::Sentiment, 0.75),
                ModelScore::new(ModelKind::ImprovedRefined, 0.78),
            ],
            Some("600036"),
        );
        assert!(fused.consistency > 0.95);
        assert_eq!(fused.weighting, WeightRegime::HighConsistency);
        assert!(fused.total_score > 70.0);
        assert_eq!(fused.recommendation, Recommendation::Buy);

        // Bought today at the current price: flat P/L, unknown holding period
        let holding = Position::new("600036", "Bank", 1000, dec!(10.30));
        let quote = StockData::new("600036", dec!(10.30))
            .with_range(dec!(10.50), dec!(10.00))
            .with_change_percent(3.0);
        let composite = fused.composite();

        let signal = engine().analyze_position(&holding, Some(&quote), Some(&composite));
        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.priority, Priority::Low);
        // model 0.3 * 0.9988 at weight 0.5, market and P/L neutral, over weight 0.9
        assert!((signal.confidence - 0.166_467).abs() < 1e-5);
        assert_eq!(signal.score, Some(composite.score));

        let mut reasons = Vec::new();
        let subs = SubSignals {
            model: Some(engine().model_signal(&composite, &mut reasons)),
            market: Some(DecisionEngine::market_signal(&quote, &mut reasons)),
            profit_loss: engine().profit_loss_signal(&holding.clone().with_current_price(dec!(10.30)), &mut reasons),
            holding: None,
        };
        let decision = engine().decide(&subs);
        assert!((decision.score - 0.17).abs() < 0.01);
    }
}
