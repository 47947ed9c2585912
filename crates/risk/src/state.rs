//! Per-day risk counters and circuit-breaker state.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradegate_core::{TradeRecord, TradingCalendar};

/// Daily counters persisted as `stats_YYYYMMDD.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyState {
    /// Exchange-local trading day these counters belong to.
    pub date: NaiveDate,
    pub daily_trade_count: u32,
    pub daily_buy_count: u32,
    /// Realized P/L booked today.
    pub daily_profit_loss: Decimal,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub last_buy_time: Option<DateTime<Utc>>,
    pub circuit_breaker_active: bool,
    pub circuit_breaker_until: Option<DateTime<Utc>>,
}

impl DailyState {
    #[must_use]
    pub fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            daily_trade_count: 0,
            daily_buy_count: 0,
            daily_profit_loss: Decimal::ZERO,
            last_trade_time: None,
            last_buy_time: None,
            circuit_breaker_active: false,
            circuit_breaker_until: None,
        }
    }

    /// Rebuilds the counters for `date` from journal records.
    ///
    /// Breaker state is not journaled; it starts inactive.
    #[must_use]
    pub fn rebuild(date: NaiveDate, records: &[TradeRecord]) -> Self {
        let mut state = Self::fresh(date);
        let mut todays: Vec<&TradeRecord> = records
            .iter()
            .filter(|r| TradingCalendar::trading_day(r.timestamp) == date)
            .collect();
        todays.sort_by_key(|r| r.timestamp);
        for record in todays {
            state.apply(record);
        }
        state
    }

    /// Books one trade into the counters.
    pub fn apply(&mut self, record: &TradeRecord) {
        self.daily_trade_count += 1;
        self.daily_profit_loss += record.profit_loss;
        self.last_trade_time = Some(record.timestamp);
        if record.action.is_buy() {
            self.daily_buy_count += 1;
            self.last_buy_time = Some(record.timestamp);
        }
    }

    /// Moves the state to a new trading day. Counters reset; a breaker whose
    /// cooldown has not lapsed is carried over.
    ///
    /// Returns true if the day changed.
    pub fn roll_to(&mut self, date: NaiveDate, now: DateTime<Utc>) -> bool {
        if self.date == date {
            return false;
        }
        let carry = self.breaker_remaining(now).map(|_| self.circuit_breaker_until);
        *self = Self::fresh(date);
        if let Some(until) = carry {
            self.circuit_breaker_active = true;
            self.circuit_breaker_until = until;
        }
        true
    }

    pub fn trip_breaker(&mut self, now: DateTime<Utc>, cooldown: Duration) {
        self.circuit_breaker_active = true;
        self.circuit_breaker_until = Some(now + cooldown);
    }

    pub fn clear_breaker(&mut self) {
        self.circuit_breaker_active = false;
        self.circuit_breaker_until = None;
    }

    /// Remaining cooldown if the breaker is active and unexpired.
    #[must_use]
    pub fn breaker_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.circuit_breaker_active {
            return None;
        }
        match self.circuit_breaker_until {
            Some(until) if now < until => Some(until - now),
            _ => None,
        }
    }
}

/// Whole seconds, rounded up, never negative.
#[must_use]
pub fn ceil_seconds(d: Duration) -> u64 {
    let millis = d.num_milliseconds().max(0);
    u64::try_from((millis + 999) / 1000).unwrap_or(0)
}
