use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradegate_core::TradeRecord;

/// Today's trades and totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub trade_count: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub total_amount: Decimal,
    pub total_profit_loss: Decimal,
    pub avg_profit_loss: Decimal,
    pub circuit_breaker_active: bool,
    pub records: Vec<TradeRecord>,
}

impl DailySummary {
    #[must_use]
    pub fn from_records(date: NaiveDate, records: Vec<TradeRecord>, circuit_breaker_active: bool) -> Self {
        let total_amount = records.iter().map(|r| r.amount).sum();
        let total_profit_loss: Decimal = records.iter().map(|r| r.profit_loss).sum();
        let buy_count = records.iter().filter(|r| r.action.is_buy()).count();

        Self {
            date,
            trade_count: records.len(),
            buy_count,
            sell_count: records.len() - buy_count,
            total_amount,
            total_profit_loss,
            avg_profit_loss: average(total_profit_loss, records.len()),
            circuit_breaker_active,
            records,
        }
    }
}

/// Trailing-window performance aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskStatistics {
    pub period_days: i64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_profit_loss: Decimal,
    /// Winning trades over all trades, 0.0 when there are none.
    pub win_rate: f64,
    pub avg_profit_loss: Decimal,
    pub max_profit: Decimal,
    pub max_loss: Decimal,
}

impl RiskStatistics {
    #[must_use]
    pub fn from_records(period_days: i64, records: &[TradeRecord]) -> Self {
        let winning_trades = records.iter().filter(|r| r.profit_loss > Decimal::ZERO).count();
        let losing_trades = records.iter().filter(|r| r.profit_loss < Decimal::ZERO).count();
        let total_profit_loss: Decimal = records.iter().map(|r| r.profit_loss).sum();

        #[allow(clippy::cast_precision_loss)]
        let win_rate = if records.is_empty() {
            0.0
        } else {
            winning_trades as f64 / records.len() as f64
        };

        Self {
            period_days,
            trade_count: records.len(),
            winning_trades,
            losing_trades,
            total_profit_loss,
            win_rate,
            avg_profit_loss: average(total_profit_loss, records.len()),
            max_profit: records
                .iter()
                .map(|r| r.profit_loss)
                .max()
                .unwrap_or(Decimal::ZERO),
            max_loss: records
                .iter()
                .map(|r| r.profit_loss)
                .min()
                .unwrap_or(Decimal::ZERO),
        }
    }
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}
