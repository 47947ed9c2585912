//! Collaborator contracts consumed by the pipeline.
//!
//! Fetch failures inside a collaborator surface as absent values, never as
//! errors propagating into fusion, decision or risk logic. `Err` is reserved
//! for plumbing failures the caller must see.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::buy::BuyRecommendation;
use crate::market::StockData;
use crate::model::ModelScore;
use crate::position::Position;
use crate::signal::TradeSignal;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest quote, or `None` if unavailable.
    async fn quote(&self, code: &str) -> Option<StockData>;
}

#[async_trait]
pub trait ModelScorer: Send + Sync {
    /// Scores from every model that answered. Missing models are simply absent.
    async fn scores(&self, code: &str) -> Vec<ModelScore>;
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn positions(&self) -> Result<Vec<Position>>;
    async fn portfolio_value(&self) -> Result<Decimal>;
    async fn available_cash(&self) -> Result<Decimal>;
}

/// Outcome reported by the execution collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub quantity: u64,
    pub price: Decimal,
}

#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    /// Executes a sell. `None` means the order did not fill.
    async fn sell(&self, signal: &TradeSignal) -> Result<Option<Fill>>;
    /// Executes a buy. `None` means the order did not fill.
    async fn buy(&self, recommendation: &BuyRecommendation) -> Result<Option<Fill>>;
}
