//! Restart and throttle scenarios for the risk manager.
//!
//! These tests drive a [`RiskManager`] with a manual clock pinned inside the
//! exchange session and verify:
//! - Same-day state survives a restart through the day snapshot
//! - Counters are rebuilt from the journal when the snapshot is lost
//! - The daily trade cap and the circuit breaker hold across restarts

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tradegate_core::{
    ManualClock, Priority, RiskLevel, TradeAction, TradeKind, TradeSignal, TradingConfig,
    EXCHANGE_TZ,
};
use tradegate_risk::{JournalError, RiskError, RiskManager};

// =============================================================================
// Helper Functions
// =============================================================================

/// Tuesday 2024-03-05, 09:45 Shanghai.
fn morning() -> DateTime<Utc> {
    EXCHANGE_TZ
        .with_ymd_and_hms(2024, 3, 5, 9, 45, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn open(dir: &Path, clock: &Arc<ManualClock>) -> RiskManager {
    RiskManager::open_with_clock(&TradingConfig::default(), dir, clock.clone()).unwrap()
}

fn sell(code: &str) -> TradeSignal {
    TradeSignal {
        stock_code: code.to_string(),
        stock_name: "Test Co".to_string(),
        action: TradeAction::Sell,
        priority: Priority::High,
        quantity: 400,
        price: Some(dec!(12.5)),
        reasons: vec!["take profit".to_string()],
        score: Some(-0.4),
        confidence: 0.8,
        timestamp: morning(),
    }
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn restart_resumes_same_day_state() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));

    let before = {
        let mut mgr = open(dir.path(), &clock);
        mgr.record_trade("600519", "A", TradeKind::Buy, 100, dec!(1700), Decimal::ZERO)
            .unwrap();
        clock.advance(Duration::minutes(5));
        mgr.record_trade("000001", "B", TradeKind::Sell, 500, dec!(11.2), dec!(-320.40))
            .unwrap();
        mgr.state().clone()
    };

    clock.advance(Duration::minutes(1));
    let mgr = open(dir.path(), &clock);
    assert_eq!(mgr.state(), &before);
    assert_eq!(mgr.state().daily_trade_count, 2);
    assert_eq!(mgr.state().daily_buy_count, 1);
    assert_eq!(mgr.state().daily_profit_loss, dec!(-320.40));
    assert_eq!(mgr.records().len(), 2);
}

#[test]
fn lost_snapshot_is_rebuilt_from_journal() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));

    let before = {
        let mut mgr = open(dir.path(), &clock);
        for i in 0..3 {
            mgr.record_trade("600000", "Bank", TradeKind::Sell, 100, dec!(10), dec!(15) * Decimal::from(i))
                .unwrap();
            clock.advance(Duration::seconds(30));
        }
        mgr.state().clone()
    };

    std::fs::remove_file(dir.path().join("stats_20240305.json")).unwrap();

    let mgr = open(dir.path(), &clock);
    assert_eq!(mgr.state(), &before);
    assert_eq!(mgr.state().daily_profit_loss, dec!(45));
}

#[test]
fn second_manager_on_same_dir_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));
    let _first = open(dir.path(), &clock);

    let second = RiskManager::open_with_clock(&TradingConfig::default(), dir.path(), clock.clone());
    assert!(matches!(
        second,
        Err(RiskError::Journal(JournalError::Locked { .. }))
    ));
}

// =============================================================================
// Throttles
// =============================================================================

#[test]
fn daily_trade_cap_blocks_next_trade() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));
    let mut mgr = open(dir.path(), &clock);

    for _ in 0..20 {
        let report = mgr.check_trade_permission(&sell("600519"), None, Decimal::ZERO);
        assert!(report.passed, "{:?}", report.errors);
        mgr.record_trade("600519", "A", TradeKind::Sell, 400, dec!(12.5), dec!(10))
            .unwrap();
        clock.advance(Duration::seconds(20));
    }

    let report = mgr.check_trade_permission(&sell("600519"), None, Decimal::ZERO);
    assert!(!report.passed);
    assert_eq!(report.risk_level, RiskLevel::High);
    assert!(report.has_error_containing("daily trade limit"));
}

#[test]
fn circuit_breaker_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));

    {
        let mut mgr = open(dir.path(), &clock);
        mgr.record_trade("600519", "A", TradeKind::Sell, 1000, dec!(9), dec!(-6000))
            .unwrap();
        clock.advance(Duration::seconds(20));
        let report = mgr.check_trade_permission(&sell("000001"), None, Decimal::ZERO);
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert!(mgr.is_halted());
    }

    clock.advance(Duration::minutes(10));
    let mut mgr = open(dir.path(), &clock);
    assert!(mgr.is_halted());

    let report = mgr.check_trade_permission(&sell("000001"), None, Decimal::ZERO);
    assert!(!report.passed);
    assert!(report.has_error_containing("circuit breaker active"));
    assert_eq!(report.wait_seconds, 50 * 60);

    clock.advance(Duration::minutes(51));
    assert!(!mgr.is_halted());
}
