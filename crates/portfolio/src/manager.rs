//! Capital allocation for approved buy candidates.
//!
//! [`PortfolioManager`] turns scored candidates into lot-rounded
//! [`BuyRecommendation`]s under the configured allocation policy, then prunes
//! them against position-count, concentration and minimum-value limits.
//! Nothing here fails: violations are dropped with a warning.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use tradegate_core::money::{ratio, scale};
use tradegate_core::position::total_value;
use tradegate_core::{
    BuyConfig, BuyRecommendation, BuySignal, CandidateStock, PortfolioConfig, Position, Priority,
    StockData, TradingConfig,
};

use crate::allocation::{shares_for, AllocationMethod};
use crate::kelly::{KellyReason, KellySizer};

/// Live price may drift at most this far from the signal price.
pub const MAX_PRICE_DEVIATION: f64 = 0.03;

/// Code prefix length used as a sector proxy.
const SECTOR_PREFIX_LEN: usize = 3;

pub struct PortfolioManager {
    config: PortfolioConfig,
    buy: BuyConfig,
    kelly: KellySizer,
}

impl PortfolioManager {
    #[must_use]
    pub fn new(config: &TradingConfig) -> Self {
        info!(
            total_capital = %config.portfolio.total_capital,
            max_positions = config.buy.max_positions,
            max_single_position = config.buy.max_single_position,
            "Portfolio manager initialized"
        );
        Self {
            config: config.portfolio.clone(),
            buy: config.buy.clone(),
            kelly: KellySizer::new(config.portfolio.kelly.clone()),
        }
    }

    /// Capital base for ratio caps and Kelly sizing.
    #[must_use]
    pub fn total_capital(&self) -> Decimal {
        self.config.total_capital
    }

    /// Cash usable for new positions after holdings and the cash reserve.
    ///
    /// `total_capital` overrides the configured capital when given.
    #[must_use]
    pub fn calculate_available_cash(
        &self,
        positions: &[Position],
        total_capital: Option<Decimal>,
    ) -> Decimal {
        let capital = total_capital.unwrap_or(self.config.total_capital);
        let held = total_value(positions);
        let reserve = scale(capital, self.buy.cash_reserve_ratio);
        let usable = (capital - held - reserve).max(Decimal::ZERO);

        info!(
            capital = %capital,
            held = %held,
            reserve = %reserve,
            usable = %usable,
            "Available cash calculated"
        );
        usable
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Sizes new positions for `candidates`.
    ///
    /// Already-held symbols are dropped and the rest are ranked by score
    /// (stable, so ties keep input order) before the open slots are filled.
    /// Recommendations below the minimum position value are discarded.
    #[must_use]
    pub fn allocate_positions(
        &self,
        candidates: &[CandidateStock],
        available_cash: Decimal,
        current_positions: &[Position],
        method: AllocationMethod,
    ) -> Vec<BuyRecommendation> {
        let slots = self.buy.max_positions.saturating_sub(current_positions.len());
        if slots == 0 {
            warn!(held = current_positions.len(), "Max positions reached, no new buys");
            return Vec::new();
        }

        let mut eligible: Vec<&CandidateStock> = candidates
            .iter()
            .filter(|c| !current_positions.iter().any(|p| p.code == c.code))
            .collect();
        if eligible.is_empty() {
            warn!("No candidates left after removing held symbols");
            return Vec::new();
        }
        eligible.sort_by(|a, b| b.score.total_cmp(&a.score));
        eligible.truncate(slots);

        info!(
            method = %method,
            candidates = eligible.len(),
            slots,
            cash = %available_cash,
            "Allocating positions"
        );

        let recommendations = match method {
            AllocationMethod::EqualWeight => self.allocate_equal_weight(&eligible, available_cash),
            AllocationMethod::ScoreWeighted => {
                self.allocate_score_weighted(&eligible, available_cash)
            }
            AllocationMethod::FractionalKelly => self.allocate_kelly(&eligible, available_cash),
        };

        let kept: Vec<BuyRecommendation> = recommendations
            .into_iter()
            .filter(|r| r.amount >= self.buy.min_position_value)
            .collect();
        info!(count = kept.len(), "Buy recommendations generated");
        kept
    }

    fn allocate_equal_weight(
        &self,
        candidates: &[&CandidateStock],
        available_cash: Decimal,
    ) -> Vec<BuyRecommendation> {
        let per_stock = available_cash / Decimal::from(candidates.len());
        candidates
            .iter()
            .filter_map(|c| self.recommend(c, per_stock, None))
            .collect()
    }

    fn allocate_score_weighted(
        &self,
        candidates: &[&CandidateStock],
        available_cash: Decimal,
    ) -> Vec<BuyRecommendation> {
        let total_score: f64 = candidates.iter().map(|c| c.score).sum();
        if total_score <= 0.0 {
            debug!("No positive scores, falling back to equal weight");
            return self.allocate_equal_weight(candidates, available_cash);
        }

        let cap = self.single_position_cap();
        candidates
            .iter()
            .filter_map(|c| {
                let cash = scale(available_cash, c.score / total_score).min(cap);
                self.recommend(c, cash, None)
            })
            .collect()
    }

    /// Allocation order matters: each candidate draws from what the previous
    /// ones left.
    fn allocate_kelly(
        &self,
        candidates: &[&CandidateStock],
        available_cash: Decimal,
    ) -> Vec<BuyRecommendation> {
        let cap = self.single_position_cap();
        let mut remaining = available_cash;
        let mut recommendations = Vec::new();

        for candidate in candidates {
            let decision = self.kelly.size(candidate.score);
            if decision.reason != KellyReason::PositiveEdge {
                debug!(code = %candidate.code, reason = ?decision.reason, "Kelly allocates nothing");
                continue;
            }

            let cash = scale(self.config.total_capital, decision.applied_fraction)
                .min(cap)
                .min(remaining);
            let note = format!(
                "Kelly fraction {:.2}% (applied {:.2}%)",
                decision.full_fraction * 100.0,
                decision.applied_fraction * 100.0
            );
            if let Some(rec) = self.recommend(candidate, cash, Some(note)) {
                remaining -= rec.amount;
                recommendations.push(rec);
            }
        }
        recommendations
    }

    fn single_position_cap(&self) -> Decimal {
        scale(self.config.total_capital, self.buy.max_single_position)
    }

    fn recommend(
        &self,
        candidate: &CandidateStock,
        cash: Decimal,
        note: Option<String>,
    ) -> Option<BuyRecommendation> {
        let quantity = shares_for(candidate.price, cash, self.config.lot_size);
        if quantity == 0 {
            debug!(code = %candidate.code, cash = %cash, price = %candidate.price, "Cash below one lot");
            return None;
        }

        let amount = candidate.price * Decimal::from(quantity);
        let mut reasons = candidate.reasons.clone();
        reasons.extend(note);
        Some(BuyRecommendation {
            code: candidate.code.clone(),
            name: candidate.name.clone(),
            score: candidate.score,
            price: candidate.price,
            quantity,
            amount,
            position_ratio: ratio(amount, self.config.total_capital),
            reasons,
        })
    }

    // =========================================================================
    // Limits
    // =========================================================================

    /// Drops recommendations that exceed the open-slot count, the single
    /// position cap, or fall under the minimum value. Returns the survivors
    /// and one warning per drop.
    #[must_use]
    pub fn check_position_limits(
        &self,
        recommendations: Vec<BuyRecommendation>,
        current_positions: &[Position],
    ) -> (Vec<BuyRecommendation>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut recommendations = recommendations;

        let total = current_positions.len() + recommendations.len();
        if total > self.buy.max_positions {
            warnings.push(format!(
                "too many positions: {total}/{}",
                self.buy.max_positions
            ));
            recommendations.truncate(self.buy.max_positions.saturating_sub(current_positions.len()));
        }

        let mut passed = Vec::with_capacity(recommendations.len());
        for rec in recommendations {
            if rec.position_ratio > self.buy.max_single_position {
                warnings.push(format!(
                    "{} position too large: {:.2}% > {:.2}%",
                    rec.code,
                    rec.position_ratio * 100.0,
                    self.buy.max_single_position * 100.0
                ));
                continue;
            }
            if rec.amount < self.buy.min_position_value {
                warnings.push(format!(
                    "{} amount too small: {:.2} < {}",
                    rec.code, rec.amount, self.buy.min_position_value
                ));
                continue;
            }
            passed.push(rec);
        }
        (passed, warnings)
    }

    /// Share of combined value per code prefix (a rough sector proxy).
    ///
    /// Groups above the concentration limit are logged; nothing is dropped.
    #[must_use]
    pub fn check_diversification(
        &self,
        recommendations: &[BuyRecommendation],
        current_positions: &[Position],
    ) -> BTreeMap<String, f64> {
        let total = total_value(current_positions)
            + recommendations.iter().map(|r| r.amount).sum::<Decimal>();
        if total <= Decimal::ZERO {
            return BTreeMap::new();
        }

        let mut weights: BTreeMap<String, f64> = BTreeMap::new();
        let holdings = current_positions
            .iter()
            .map(|p| (p.code.as_str(), p.position_value()));
        let additions = recommendations.iter().map(|r| (r.code.as_str(), r.amount));
        for (code, value) in holdings.chain(additions) {
            let sector: String = code.chars().take(SECTOR_PREFIX_LEN).collect();
            *weights.entry(sector).or_insert(0.0) += ratio(value, total);
        }

        for (sector, weight) in &weights {
            if *weight > self.config.max_industry_concentration {
                warn!(
                    sector = %sector,
                    weight = %format!("{:.2}%", weight * 100.0),
                    limit = %format!("{:.2}%", self.config.max_industry_concentration * 100.0),
                    "Sector concentration too high"
                );
            }
        }
        weights
    }

    /// Applies [`Self::check_position_limits`] then reports diversification.
    #[must_use]
    pub fn optimize_portfolio(
        &self,
        recommendations: Vec<BuyRecommendation>,
        current_positions: &[Position],
    ) -> Vec<BuyRecommendation> {
        let (passed, warnings) = self.check_position_limits(recommendations, current_positions);
        for warning in &warnings {
            warn!("{warning}");
        }

        let weights = self.check_diversification(&passed, current_positions);
        for (sector, weight) in &weights {
            debug!(sector = %sector, weight = %format!("{:.2}%", weight * 100.0), "Sector weight");
        }
        passed
    }

    // =========================================================================
    // Buy signals
    // =========================================================================

    /// Converts recommendations into prioritized buy signals.
    ///
    /// Sorted by priority then score (highest first) and truncated to the
    /// per-pass buy count.
    #[must_use]
    pub fn build_buy_signals(
        &self,
        recommendations: &[BuyRecommendation],
        now: DateTime<Utc>,
    ) -> Vec<BuySignal> {
        let mut signals: Vec<BuySignal> = recommendations
            .iter()
            .map(|rec| BuySignal {
                stock_code: rec.code.clone(),
                stock_name: rec.name.clone(),
                price: rec.price,
                quantity: rec.quantity,
                amount: rec.amount,
                score: rec.score,
                priority: buy_priority(rec.score),
                confidence: (rec.score / 100.0).clamp(0.0, 0.95),
                reasons: rec.reasons.clone(),
                timestamp: now,
            })
            .collect();

        signals.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.score.total_cmp(&a.score))
        });
        signals.truncate(self.buy.max_buy_count);

        info!(count = signals.len(), "Buy signals built");
        signals
    }

    /// Sanity-checks a buy signal against order rules and a fresh quote.
    ///
    /// # Errors
    ///
    /// Returns every violated rule as a message.
    pub fn validate_buy_signal(
        &self,
        signal: &BuySignal,
        quote: Option<&StockData>,
    ) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let lot = u64::from(self.config.lot_size);

        if signal.quantity == 0 {
            errors.push("quantity must be positive".to_string());
        } else if lot > 0 && signal.quantity % lot != 0 {
            errors.push(format!("quantity must be a multiple of {lot}"));
        }
        if signal.price <= Decimal::ZERO {
            errors.push("price must be positive".to_string());
        }
        if signal.amount < self.buy.min_position_value {
            errors.push(format!(
                "amount too small ({:.2} < {})",
                signal.amount, self.buy.min_position_value
            ));
        }

        match quote {
            Some(data) => {
                if data.is_limit_up() || data.is_limit_down() {
                    errors.push(format!(
                        "stock at price limit ({:+.2}%)",
                        data.change_percent
                    ));
                }
                if signal.price > Decimal::ZERO
                    && data.deviation_from(signal.price) > MAX_PRICE_DEVIATION
                {
                    errors.push(format!(
                        "price drifted: signal {:.2}, live {:.2}",
                        signal.price, data.current_price
                    ));
                }
            }
            None => errors.push("no live quote".to_string()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(code = %signal.stock_code, errors = %errors.join("; "), "Buy signal invalid");
            Err(errors)
        }
    }
}

fn buy_priority(score: f64) -> Priority {
    if score >= 85.0 {
        Priority::High
    } else if score >= 75.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn manager() -> PortfolioManager {
        PortfolioManager::new(&TradingConfig::default())
    }

    fn candidate(code: &str, score: f64, price: Decimal) -> CandidateStock {
        CandidateStock::new(code, format!("Stock {code}"), score, price).with_reason("model pick")
    }

    fn held(code: &str, qty: u64, price: Decimal) -> Position {
        Position::new(code, "Held", qty, price).with_current_price(price)
    }

    #[test]
    fn available_cash_subtracts_holdings_and_reserve() {
        let pm = manager();
        let positions = vec![held("600483", 1000, dec!(23.30)), held("603993", 2000, dec!(5.80))];
        // 100000 - 23300 - 11600 - 10000
        assert_eq!(pm.calculate_available_cash(&positions, None), dec!(55100));
        assert_eq!(pm.calculate_available_cash(&positions, Some(dec!(30000))), Decimal::ZERO);
    }

    #[test]
    fn equal_weight_splits_cash() {
        let pm = manager();
        let recs = pm.allocate_positions(
            &[candidate("600000", 70.0, dec!(10)), candidate("600036", 60.0, dec!(20))],
            dec!(20000),
            &[],
            AllocationMethod::EqualWeight,
        );
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].quantity, 1000);
        assert_eq!(recs[1].quantity, 500);
        assert!(recs.iter().all(|r| r.quantity % 100 == 0));
    }

    #[test]
    fn score_weighted_respects_single_cap() {
        let pm = manager();
        let recs = pm.allocate_positions(
            &[candidate("600000", 90.0, dec!(10)), candidate("600036", 10.0, dec!(10))],
            dec!(60000),
            &[],
            AllocationMethod::ScoreWeighted,
        );
        // 54000 requested for the first, capped at 20% of 100000
        assert_eq!(recs[0].code, "600000");
        assert_eq!(recs[0].amount, dec!(20000));
        assert_eq!(recs[1].amount, dec!(6000));
    }

    #[test]
    fn candidates_are_ranked_and_held_skipped() {
        let pm = manager();
        let recs = pm.allocate_positions(
            &[
                candidate("600001", 60.0, dec!(10)),
                candidate("600002", 80.0, dec!(10)),
                candidate("600003", 95.0, dec!(10)),
            ],
            dec!(30000),
            &[held("600003", 100, dec!(10))],
            AllocationMethod::EqualWeight,
        );
        let codes: Vec<&str> = recs.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["600002", "600001"]);
    }

    #[test]
    fn no_slots_means_no_recommendations() {
        let pm = manager();
        let positions: Vec<Position> = (0..10)
            .map(|i| held(&format!("60000{i}"), 100, dec!(10)))
            .collect();
        let recs = pm.allocate_positions(
            &[candidate("000001", 90.0, dec!(10))],
            dec!(50000),
            &positions,
            AllocationMethod::ScoreWeighted,
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn kelly_draws_down_running_cash() {
        let pm = manager();
        let recs = pm.allocate_positions(
            &[candidate("600000", 80.0, dec!(10)), candidate("600036", 80.0, dec!(10))],
            dec!(9000),
            &[],
            AllocationMethod::FractionalKelly,
        );
        // 6250 each requested; the first buys 600 shares, the second is left 3000
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].amount, dec!(6000));
        assert!(recs[0].reasons.iter().any(|r| r.starts_with("Kelly fraction")));
    }

    #[test]
    fn small_allocations_are_dropped() {
        let pm = manager();
        let recs = pm.allocate_positions(
            &[candidate("600000", 50.0, dec!(24.50))],
            dec!(2600),
            &[],
            AllocationMethod::EqualWeight,
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn position_limits_drop_oversized() {
        let pm = manager();
        let ok = BuyRecommendation {
            code: "600000".into(),
            name: "A".into(),
            score: 80.0,
            price: dec!(10),
            quantity: 1000,
            amount: dec!(10000),
            position_ratio: 0.1,
            reasons: vec![],
        };
        let big = BuyRecommendation {
            code: "600001".into(),
            amount: dec!(25000),
            position_ratio: 0.25,
            ..ok.clone()
        };
        let (passed, warnings) = pm.check_position_limits(vec![ok, big], &[]);
        assert_eq!(passed.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("600001"));
    }

    #[test]
    fn diversification_groups_by_prefix() {
        let pm = manager();
        let positions = vec![held("600483", 1000, dec!(10)), held("000001", 1000, dec!(10))];
        let weights = pm.check_diversification(&[], &positions);
        assert!((weights["600"] - 0.5).abs() < 1e-9);
        assert!((weights["000"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn buy_signals_prioritized_and_truncated() {
        let pm = manager();
        let recs: Vec<BuyRecommendation> = [70.0, 88.0, 76.0, 90.0, 60.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, score)| BuyRecommendation {
                code: format!("60000{i}"),
                name: "X".into(),
                score: *score,
                price: dec!(10),
                quantity: 600,
                amount: dec!(6000),
                position_ratio: 0.06,
                reasons: vec![],
            })
            .collect();

        let signals = pm.build_buy_signals(&recs, Utc::now());
        assert_eq!(signals.len(), 5);
        let scores: Vec<f64> = signals.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![90.0, 88.0, 80.0, 76.0, 70.0]);
        assert_eq!(signals[0].priority, Priority::High);
        assert_eq!(signals[2].priority, Priority::Medium);
        assert_eq!(signals[4].priority, Priority::Low);
        assert!((signals[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn validation_checks_quote() {
        let pm = manager();
        let rec = BuyRecommendation {
            code: "600000".into(),
            name: "Bank".into(),
            score: 80.0,
            price: dec!(10),
            quantity: 600,
            amount: dec!(6000),
            position_ratio: 0.06,
            reasons: vec![],
        };
        let signal = pm.build_buy_signals(&[rec], Utc::now()).remove(0);

        let live = StockData::new("600000", dec!(10.2)).with_change_percent(2.0);
        assert!(pm.validate_buy_signal(&signal, Some(&live)).is_ok());

        let drifted = StockData::new("600000", dec!(10.5)).with_change_percent(5.0);
        let errors = pm.validate_buy_signal(&signal, Some(&drifted)).unwrap_err();
        assert!(errors[0].contains("drifted"));

        let limit_up = StockData::new("600000", dec!(10.1)).with_change_percent(10.0);
        assert!(pm.validate_buy_signal(&signal, Some(&limit_up)).is_err());

        assert_eq!(
            pm.validate_buy_signal(&signal, None).unwrap_err(),
            vec!["no live quote".to_string()]
        );
    }

    #[test]
    fn validation_rejects_odd_lots() {
        let pm = manager();
        let signal = BuySignal {
            stock_code: "600000".into(),
            stock_name: "Bank".into(),
            price: dec!(10),
            quantity: 550,
            amount: dec!(5500),
            score: 80.0,
            priority: Priority::Medium,
            confidence: 0.8,
            reasons: vec![],
            timestamp: Utc::now(),
        };
        let live = StockData::new("600000", dec!(10));
        let errors = pm.validate_buy_signal(&signal, Some(&live)).unwrap_err();
        assert_eq!(errors, vec!["quantity must be a multiple of 100".to_string()]);
    }
}
