//! Exchange trading calendar.
//!
//! All wall-clock checks are done in exchange local time (Asia/Shanghai),
//! regardless of the host time zone.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::SessionConfig;

pub const EXCHANGE_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Where a timestamp falls in the trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Weekend.
    NonTradingDay,
    /// Inside a configured avoid window (call auctions).
    Auction,
    Continuous,
    Closed,
}

#[derive(Debug, Clone)]
pub struct TradingCalendar {
    session: SessionConfig,
}

impl TradingCalendar {
    #[must_use]
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn local(now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&EXCHANGE_TZ)
    }

    /// Exchange-local calendar day of `now`.
    #[must_use]
    pub fn trading_day(now: DateTime<Utc>) -> NaiveDate {
        Self::local(now).date_naive()
    }

    #[must_use]
    pub fn phase(&self, now: DateTime<Utc>) -> SessionPhase {
        let local = Self::local(now);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return SessionPhase::NonTradingDay;
        }

        let t = local.time();
        if self.session.avoid.iter().any(|w| w.contains(t)) {
            return SessionPhase::Auction;
        }
        if self.session.sessions.iter().any(|w| w.contains(t)) {
            SessionPhase::Continuous
        } else {
            SessionPhase::Closed
        }
    }

    #[must_use]
    pub fn is_trading_time(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == SessionPhase::Continuous
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Builds a UTC instant from Shanghai wall-clock time.
    fn cst(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        EXCHANGE_TZ
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn continuous_sessions_on_weekdays() {
        let cal = TradingCalendar::default();
        // 2024-03-04 is a Monday
        assert!(cal.is_trading_time(cst(2024, 3, 4, 9, 30)));
        assert!(cal.is_trading_time(cst(2024, 3, 4, 11, 30)));
        assert!(cal.is_trading_time(cst(2024, 3, 4, 14, 0)));
        assert_eq!(cal.phase(cst(2024, 3, 4, 12, 0)), SessionPhase::Closed);
        assert_eq!(cal.phase(cst(2024, 3, 4, 16, 0)), SessionPhase::Closed);
    }

    #[test]
    fn auction_windows_are_avoided() {
        let cal = TradingCalendar::default();
        assert_eq!(cal.phase(cst(2024, 3, 4, 9, 20)), SessionPhase::Auction);
        assert_eq!(cal.phase(cst(2024, 3, 4, 14, 58)), SessionPhase::Auction);
        assert!(!cal.is_trading_time(cst(2024, 3, 4, 15, 0)));
    }

    #[test]
    fn weekends_are_closed() {
        let cal = TradingCalendar::default();
        assert_eq!(cal.phase(cst(2024, 3, 9, 10, 0)), SessionPhase::NonTradingDay);
    }

    #[test]
    fn trading_day_uses_exchange_time_zone() {
        // 23:30 UTC on March 3rd is already March 4th in Shanghai
        let late_utc = Utc.with_ymd_and_hms(2024, 3, 3, 23, 30, 0).unwrap();
        assert_eq!(
            TradingCalendar::trading_day(late_utc),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
    }
}
