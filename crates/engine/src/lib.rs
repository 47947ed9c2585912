//! Pipeline wiring: collaborators → fusion → decision → risk → sizing →
//! execution → journal.

pub mod report;
pub mod system;

pub use report::{PassReport, SkipReason, Skipped};
pub use system::TradingSystem;
