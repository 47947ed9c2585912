pub mod buy;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod market;
pub mod model;
pub mod money;
pub mod position;
pub mod report;
pub mod signal;
pub mod trade;
pub mod traits;

pub use buy::{BuyRecommendation, BuySignal, CandidateStock};
pub use calendar::{SessionPhase, TradingCalendar, EXCHANGE_TZ};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BuyConfig, DecisionConfig, DecisionWeights, FusionConfig, KellyConfig, PortfolioConfig,
    RiskConfig, SessionConfig, TimeWindow, TradingConfig,
};
pub use config_loader::ConfigLoader;
pub use error::ParseEnumError;
pub use market::{is_st_name, DepthLevel, StockData};
pub use model::{ModelKind, ModelScore};
pub use position::Position;
pub use report::{RiskLevel, RiskReport};
pub use signal::{CompositeScore, Priority, Recommendation, TradeAction, TradeSignal};
pub use trade::{TradeKind, TradeRecord};
pub use traits::{ExecutionHandler, Fill, MarketDataProvider, ModelScorer, PositionStore};
