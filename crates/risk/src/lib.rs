//! Risk layer.
//!
//! [`RiskManager`] owns the daily counters and circuit breaker, validates
//! every prospective trade, and journals executed trades through
//! [`TradeJournal`] so a restart resumes the same day's state.

pub mod error;
pub mod journal;
pub mod manager;
pub mod state;
pub mod stats;

pub use error::{JournalError, RiskError};
pub use journal::TradeJournal;
pub use manager::RiskManager;
pub use state::DailyState;
pub use stats::{DailySummary, RiskStatistics};
