//! Risk manager: the only stateful component of the pipeline.
//!
//! Every prospective trade runs through an ordered, short-circuiting cascade
//! of checks, cheapest and most catastrophic first. Admission failures are
//! reported in the returned [`RiskReport`], never as `Err`. Daily counters
//! and the circuit breaker are persisted after every mutation.
//!
//! The manager assumes a single logical trading loop; it takes `&mut self`
//! for anything that mutates state and performs no internal locking.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tradegate_core::money::{ratio, scale, to_f64};
use tradegate_core::{
    BuyConfig, BuySignal, Clock, Position, Priority, RiskConfig, RiskLevel, RiskReport,
    SystemClock, TradeKind, TradeRecord, TradeSignal, TradingCalendar, TradingConfig,
};

use crate::error::RiskError;
use crate::journal::TradeJournal;
use crate::state::{ceil_seconds, DailyState};
use crate::stats::{DailySummary, RiskStatistics};

fn chrono_duration(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

pub struct RiskManager {
    risk: RiskConfig,
    buy: BuyConfig,
    calendar: TradingCalendar,
    clock: Arc<dyn Clock>,
    journal: TradeJournal,
    state: DailyState,
    /// Trailing `history_days` of records, oldest first.
    records: Vec<TradeRecord>,
}

impl RiskManager {
    /// Opens the manager on `data_dir` using the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal directory is locked or unreadable.
    pub fn open(config: &TradingConfig, data_dir: impl AsRef<Path>) -> Result<Self, RiskError> {
        Self::open_with_clock(config, data_dir, Arc::new(SystemClock))
    }

    /// Opens the manager with an injected clock.
    ///
    /// Same-day state is resumed from the day snapshot. Without a usable
    /// snapshot the counters are rebuilt from today's journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal directory is locked or unreadable.
    pub fn open_with_clock(
        config: &TradingConfig,
        data_dir: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RiskError> {
        let journal = TradeJournal::open(data_dir)?;
        let now = clock.now();
        let today = TradingCalendar::trading_day(now);

        let cutoff = now - chrono::Duration::days(config.risk.history_days);
        let mut records = journal.load_range(today, config.risk.history_days + 1)?;
        records.retain(|r| r.timestamp >= cutoff);

        let state = journal
            .load_snapshot(today)
            .unwrap_or_else(|| DailyState::rebuild(today, &records));

        info!(
            date = %today,
            records = records.len(),
            trades_today = state.daily_trade_count,
            breaker = state.circuit_breaker_active,
            "Risk manager initialized"
        );

        Ok(Self {
            risk: config.risk.clone(),
            buy: config.buy.clone(),
            calendar: TradingCalendar::new(config.session.clone()),
            clock,
            journal,
            state,
            records,
        })
    }

    #[must_use]
    pub fn state(&self) -> &DailyState {
        &self.state
    }

    #[must_use]
    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    /// True while an unexpired circuit breaker blocks all trading.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.state.breaker_remaining(self.clock.now()).is_some()
    }

    // =========================================================================
    // Permission checks
    // =========================================================================

    /// Validates a sell (or any non-buy) signal.
    ///
    /// `portfolio_value` is the loss-ratio denominator; pass zero to fall back
    /// to the configured reference capital.
    pub fn check_trade_permission(
        &mut self,
        signal: &TradeSignal,
        position: Option<&Position>,
        portfolio_value: Decimal,
    ) -> RiskReport {
        let now = self.clock.now();
        self.refresh_day(now);
        let mut report = RiskReport::new();

        if !self.check_circuit_breaker(now, &mut report)
            || !self.check_trading_time(now, &mut report)
            || !self.check_daily_trade_limit(&mut report)
            || !Self::check_interval(
                "trade",
                self.state.last_trade_time,
                self.risk.min_trade_interval,
                now,
                &mut report,
            )
        {
            return Self::rejected(&signal.stock_code, report);
        }

        if let Some(pos) = position {
            let price = signal.price.or(pos.current_price).unwrap_or(Decimal::ZERO);
            let amount = price * Decimal::from(signal.quantity);
            if amount > self.risk.max_single_trade_amount {
                report.fail(
                    RiskLevel::High,
                    format!(
                        "trade amount {amount:.2} exceeds limit {}",
                        self.risk.max_single_trade_amount
                    ),
                );
                return Self::rejected(&signal.stock_code, report);
            }
            if amount < self.risk.min_trade_amount {
                report.warn(format!(
                    "trade amount {amount:.2} below suggested minimum {}",
                    self.risk.min_trade_amount
                ));
            }

            if portfolio_value > Decimal::ZERO {
                let position_ratio = ratio(pos.position_value(), portfolio_value);
                if position_ratio > self.risk.max_position_ratio {
                    report.warn(format!(
                        "position ratio too high ({:.1}% > {:.1}%)",
                        position_ratio * 100.0,
                        self.risk.max_position_ratio * 100.0
                    ));
                }
            }
        }

        if !self.check_daily_loss_limit(now, portfolio_value, &mut report) {
            return Self::rejected(&signal.stock_code, report);
        }

        if let Some(pos) = position.filter(|p| p.is_st()) {
            if portfolio_value > Decimal::ZERO {
                let st_ratio = ratio(pos.position_value(), portfolio_value);
                if st_ratio > self.risk.st_max_ratio {
                    report.warn(format!(
                        "ST position too large ({:.1}% > {:.1}%)",
                        st_ratio * 100.0,
                        self.risk.st_max_ratio * 100.0
                    ));
                }
            }
            report.warn(format!("{} is an ST name, elevated risk", pos.name));
        }

        if signal.priority == Priority::Critical {
            report.suggest("urgent signal, execute immediately");
        } else if signal.confidence < 0.6 {
            report.suggest(format!(
                "low decision confidence ({:.1}%), proceed with caution",
                signal.confidence * 100.0
            ));
        }

        self.base_metrics(&mut report);
        report.metric("signal_confidence", signal.confidence);

        info!(code = %signal.stock_code, level = %report.risk_level, "Trade permission granted");
        report
    }

    /// Validates a buy signal against throttles, concentration and cash.
    pub fn check_buy_permission(
        &mut self,
        signal: &BuySignal,
        positions: &[Position],
        available_cash: Decimal,
        total_capital: Decimal,
    ) -> RiskReport {
        let now = self.clock.now();
        self.refresh_day(now);
        let mut report = RiskReport::new();

        if !self.check_circuit_breaker(now, &mut report) || !self.check_trading_time(now, &mut report) {
            return Self::rejected(&signal.stock_code, report);
        }

        let cap = self.buy.max_daily_buy_count;
        if self.state.daily_buy_count >= cap {
            report.fail(
                RiskLevel::High,
                format!("daily buy limit reached ({}/{cap})", self.state.daily_buy_count),
            );
            return Self::rejected(&signal.stock_code, report);
        }
        if f64::from(self.state.daily_buy_count) >= f64::from(cap) * self.risk.warning_fraction {
            report.warn(format!(
                "daily buy count near limit ({}/{cap})",
                self.state.daily_buy_count
            ));
        }

        if !Self::check_interval(
            "buy",
            self.state.last_buy_time,
            self.buy.min_buy_interval,
            now,
            &mut report,
        ) {
            return Self::rejected(&signal.stock_code, report);
        }

        if positions.len() >= self.buy.max_positions {
            report.fail(
                RiskLevel::High,
                format!(
                    "max open positions reached ({}/{})",
                    positions.len(),
                    self.buy.max_positions
                ),
            );
            return Self::rejected(&signal.stock_code, report);
        }

        if positions.iter().any(|p| p.code == signal.stock_code) {
            report.warn(format!(
                "already holding {}, avoid doubling up",
                signal.stock_name
            ));
        }

        if total_capital > Decimal::ZERO {
            let max_single = self.buy.max_single_position;
            let position_ratio = ratio(signal.amount, total_capital);
            if position_ratio > max_single {
                report.fail(
                    RiskLevel::High,
                    format!(
                        "single position ratio too high ({:.1}% > {:.1}%)",
                        position_ratio * 100.0,
                        max_single * 100.0
                    ),
                );
                return Self::rejected(&signal.stock_code, report);
            }
            if position_ratio > max_single * 0.9 {
                report.warn(format!(
                    "single position ratio near limit ({:.1}%)",
                    position_ratio * 100.0
                ));
            }

            let today = TradingCalendar::trading_day(now);
            let new_ratio = ratio(self.bought_on(today) + signal.amount, total_capital);
            let max_new = self.buy.max_new_position_ratio;
            if new_ratio > max_new {
                report.fail(
                    RiskLevel::High,
                    format!(
                        "new positions today too large ({:.1}% > {:.1}%)",
                        new_ratio * 100.0,
                        max_new * 100.0
                    ),
                );
                return Self::rejected(&signal.stock_code, report);
            }
            if new_ratio > max_new * self.risk.warning_fraction {
                report.warn(format!(
                    "new positions today near limit ({:.1}%)",
                    new_ratio * 100.0
                ));
            }
        }

        if signal.amount < self.buy.min_position_value {
            report.fail(
                RiskLevel::Medium,
                format!(
                    "buy amount {:.2} below minimum {}",
                    signal.amount, self.buy.min_position_value
                ),
            );
            return Self::rejected(&signal.stock_code, report);
        }
        if signal.amount > self.risk.max_single_trade_amount {
            report.fail(
                RiskLevel::High,
                format!(
                    "buy amount {:.2} exceeds limit {}",
                    signal.amount, self.risk.max_single_trade_amount
                ),
            );
            return Self::rejected(&signal.stock_code, report);
        }

        let required = scale(signal.amount, 1.0 + self.buy.cash_safety_buffer);
        if available_cash < required {
            report.fail(
                RiskLevel::Critical,
                format!("insufficient cash (need {required:.2}, have {available_cash:.2})"),
            );
            return Self::rejected(&signal.stock_code, report);
        }

        let min_reserve = scale(total_capital, self.buy.cash_reserve_ratio);
        let remaining = available_cash - signal.amount;
        if remaining < min_reserve {
            report.warn(format!(
                "cash reserve low after buy ({remaining:.2} < {min_reserve:.2})"
            ));
        }

        if signal.is_st() {
            report.warn(format!("{} is an ST name, elevated risk", signal.stock_name));
            let st_value: Decimal = positions
                .iter()
                .filter(|p| p.is_st())
                .map(Position::position_value)
                .sum();
            if total_capital > Decimal::ZERO {
                let st_ratio = ratio(st_value + signal.amount, total_capital);
                if st_ratio > self.risk.st_max_ratio {
                    report.fail(
                        RiskLevel::High,
                        format!(
                            "total ST exposure too high ({:.1}% > {:.1}%)",
                            st_ratio * 100.0,
                            self.risk.st_max_ratio * 100.0
                        ),
                    );
                    return Self::rejected(&signal.stock_code, report);
                }
            }
        }

        if signal.priority == Priority::High {
            report.suggest("high-priority buy, execute first");
        } else if signal.confidence < 0.7 {
            report.suggest(format!(
                "low buy confidence ({:.1}%), proceed with caution",
                signal.confidence * 100.0
            ));
        }
        if signal.score >= 85.0 {
            report.suggest(format!("high-score stock ({:.1})", signal.score));
        }

        self.base_metrics(&mut report);
        report.metric("daily_buy_count", self.state.daily_buy_count);
        report.metric("signal_confidence", signal.confidence);
        report.metric("signal_score", signal.score);
        report.metric("available_cash", to_f64(available_cash));
        report.metric("buy_amount", to_f64(signal.amount));
        report.metric("remaining_cash", to_f64(remaining));

        info!(
            code = %signal.stock_code,
            level = %report.risk_level,
            confidence = %format!("{:.2}", signal.confidence),
            "Buy permission granted"
        );
        report
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Journals an executed trade and updates the daily counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal line or the snapshot cannot be written.
    pub fn record_trade(
        &mut self,
        stock_code: &str,
        stock_name: &str,
        action: TradeKind,
        quantity: u64,
        price: Decimal,
        profit_loss: Decimal,
    ) -> Result<TradeRecord, RiskError> {
        let now = self.clock.now();
        self.refresh_day(now);

        let record = TradeRecord::new(now, stock_code, stock_name, action, quantity, price)
            .with_profit_loss(profit_loss);
        self.journal.append(&record)?;
        self.state.apply(&record);
        self.records.push(record.clone());
        self.prune(now);
        self.journal.save_snapshot(&self.state)?;

        info!(
            code = stock_code,
            action = %action,
            quantity,
            price = %price,
            profit_loss = %profit_loss,
            "Trade recorded"
        );
        Ok(record)
    }

    /// Today's trades and totals.
    pub fn get_daily_summary(&mut self) -> DailySummary {
        let now = self.clock.now();
        self.refresh_day(now);
        let today = self.state.date;
        let records = self
            .records
            .iter()
            .filter(|r| TradingCalendar::trading_day(r.timestamp) == today)
            .cloned()
            .collect();
        DailySummary::from_records(today, records, self.state.circuit_breaker_active)
    }

    /// Aggregate over the trailing `history_days`.
    #[must_use]
    pub fn get_risk_statistics(&self) -> RiskStatistics {
        let cutoff = self.clock.now() - chrono::Duration::days(self.risk.history_days);
        let recent: Vec<TradeRecord> = self
            .records
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect();
        RiskStatistics::from_records(self.risk.history_days, &recent)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn refresh_day(&mut self, now: DateTime<Utc>) {
        let today = TradingCalendar::trading_day(now);
        if self.state.roll_to(today, now) {
            info!(date = %today, breaker = self.state.circuit_breaker_active, "New trading day, counters reset");
            self.prune(now);
            self.persist();
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::days(self.risk.history_days);
        self.records.retain(|r| r.timestamp >= cutoff);
    }

    fn persist(&self) {
        if let Err(e) = self.journal.save_snapshot(&self.state) {
            warn!(error = %e, "Failed to persist risk state");
        }
    }

    fn rejected(code: &str, report: RiskReport) -> RiskReport {
        warn!(
            code,
            level = %report.risk_level,
            errors = %report.errors.join("; "),
            "Risk check rejected"
        );
        report
    }

    fn check_circuit_breaker(&mut self, now: DateTime<Utc>, report: &mut RiskReport) -> bool {
        if !self.state.circuit_breaker_active {
            return true;
        }
        if let Some(remaining) = self.state.breaker_remaining(now) {
            let secs = ceil_seconds(remaining);
            report.wait_seconds = secs;
            report.fail(
                RiskLevel::Critical,
                format!("circuit breaker active, {secs}s cooldown remaining"),
            );
            return false;
        }

        self.state.clear_breaker();
        self.persist();
        info!("Circuit breaker cleared");
        true
    }

    fn check_trading_time(&self, now: DateTime<Utc>, report: &mut RiskReport) -> bool {
        if self.calendar.is_trading_time(now) {
            return true;
        }
        report.fail(RiskLevel::High, "outside trading hours");
        false
    }

    fn check_daily_trade_limit(&self, report: &mut RiskReport) -> bool {
        let count = self.state.daily_trade_count;
        let cap = self.risk.max_daily_trades;
        if count >= cap {
            report.fail(RiskLevel::High, format!("daily trade limit reached ({count}/{cap})"));
            return false;
        }
        if f64::from(count) >= f64::from(cap) * self.risk.warning_fraction {
            report.warn(format!("daily trade count near limit ({count}/{cap})"));
        }
        true
    }

    fn check_interval(
        what: &str,
        last: Option<DateTime<Utc>>,
        interval: std::time::Duration,
        now: DateTime<Utc>,
        report: &mut RiskReport,
    ) -> bool {
        let Some(last) = last else {
            return true;
        };
        let elapsed = now - last;
        let min = chrono_duration(interval);
        if elapsed >= min {
            return true;
        }

        let wait = ceil_seconds(min - elapsed);
        report.wait_seconds = wait;
        report.fail(
            RiskLevel::Medium,
            format!(
                "last {what} too recent ({}s < {}s), wait {wait}s",
                elapsed.num_seconds(),
                min.num_seconds()
            ),
        );
        false
    }

    /// Trips the breaker when today's realized loss reaches the limit.
    fn check_daily_loss_limit(
        &mut self,
        now: DateTime<Utc>,
        portfolio_value: Decimal,
        report: &mut RiskReport,
    ) -> bool {
        let pl = self.state.daily_profit_loss;
        if pl >= Decimal::ZERO {
            return true;
        }

        let denominator = if portfolio_value > Decimal::ZERO {
            portfolio_value
        } else {
            self.risk.reference_capital
        };
        let loss_ratio = ratio(-pl, denominator);
        debug!(loss_ratio, limit = self.risk.daily_loss_limit, "Daily loss check");

        if loss_ratio >= self.risk.daily_loss_limit {
            let cooldown = chrono_duration(self.risk.circuit_breaker_cooldown);
            self.state.trip_breaker(now, cooldown);
            self.persist();
            warn!(
                daily_profit_loss = %pl,
                loss_ratio,
                until = ?self.state.circuit_breaker_until,
                "Circuit breaker tripped"
            );
            report.wait_seconds = ceil_seconds(cooldown);
            report.fail(
                RiskLevel::Critical,
                format!("daily loss limit hit ({pl:.2}), circuit breaker tripped"),
            );
            return false;
        }
        if loss_ratio >= self.risk.daily_loss_limit * self.risk.warning_fraction {
            report.warn_at(
                RiskLevel::Medium,
                format!("daily loss near circuit breaker ({pl:.2})"),
            );
        }
        true
    }

    fn bought_on(&self, day: NaiveDate) -> Decimal {
        self.records
            .iter()
            .filter(|r| r.action.is_buy() && TradingCalendar::trading_day(r.timestamp) == day)
            .map(|r| r.amount)
            .sum()
    }

    fn base_metrics(&self, report: &mut RiskReport) {
        report.metric("daily_trade_count", self.state.daily_trade_count);
        report.metric("daily_profit_loss", to_f64(self.state.daily_profit_loss));
        report.metric("circuit_breaker_active", self.state.circuit_breaker_active);
    }
}
