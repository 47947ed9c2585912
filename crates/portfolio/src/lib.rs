//! Portfolio layer: turns risk-approved candidates into lot-rounded buy
//! orders under capital, concentration and position-count limits.

pub mod allocation;
pub mod error;
pub mod kelly;
pub mod manager;

pub use allocation::{shares_for, AllocationMethod};
pub use error::PortfolioError;
pub use kelly::{KellyDecision, KellyReason, KellySizer};
pub use manager::{PortfolioManager, MAX_PRICE_DEVIATION};
