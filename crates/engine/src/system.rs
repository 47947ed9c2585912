//! End-to-end trading passes.
//!
//! A sell pass analyzes every holding and routes sell signals through the
//! risk gate to the executor. A buy pass sizes screened candidates, validates
//! them against fresh quotes and routes approved buys the same way. Each
//! executed (or, in dry-run mode, simulated) trade is journaled through the
//! risk manager.
//!
//! Collaborator fetches for different symbols run concurrently; everything
//! touching the risk manager runs sequentially.

use anyhow::Result;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use tradegate_core::{
    BuyRecommendation, BuySignal, CandidateStock, Clock, CompositeScore, ExecutionHandler,
    MarketDataProvider, ModelScorer, Position, PositionStore, StockData, SystemClock, TradeKind,
    TradeSignal, TradingConfig,
};
use tradegate_portfolio::{AllocationMethod, PortfolioManager};
use tradegate_risk::RiskManager;
use tradegate_signals::{DecisionEngine, FusionResult, ModelFusionEngine};

use crate::report::{PassReport, SkipReason};

pub struct TradingSystem<D, M, P, E>
where
    D: MarketDataProvider,
    M: ModelScorer,
    P: PositionStore,
    E: ExecutionHandler,
{
    market: D,
    scorer: M,
    store: P,
    executor: E,
    fusion: ModelFusionEngine,
    decision: DecisionEngine,
    risk: RiskManager,
    portfolio: PortfolioManager,
    clock: Arc<dyn Clock>,
    allocation: AllocationMethod,
    dry_run: bool,
}

impl<D, M, P, E> TradingSystem<D, M, P, E>
where
    D: MarketDataProvider,
    M: ModelScorer,
    P: PositionStore,
    E: ExecutionHandler,
{
    /// Builds the pipeline from one configuration context and an opened risk manager.
    pub fn new(
        config: &TradingConfig,
        risk: RiskManager,
        market: D,
        scorer: M,
        store: P,
        executor: E,
    ) -> Self {
        Self {
            market,
            scorer,
            store,
            executor,
            fusion: ModelFusionEngine::new(config.fusion.clone()),
            decision: DecisionEngine::new(config.decision.clone()),
            risk,
            portfolio: PortfolioManager::new(config),
            clock: Arc::new(SystemClock),
            allocation: AllocationMethod::default(),
            dry_run: false,
        }
    }

    /// Clock used for signal timestamps. The risk manager keeps its own.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.decision = self.decision.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    /// Records simulated trades instead of calling the executor.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_allocation(mut self, method: AllocationMethod) -> Self {
        self.allocation = method;
        self
    }

    #[must_use]
    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn risk_mut(&mut self) -> &mut RiskManager {
        &mut self.risk
    }

    // =========================================================================
    // Scoring
    // =========================================================================

    /// Fetches quotes and fused scores for `codes` concurrently.
    async fn gather(
        &self,
        codes: &[String],
    ) -> (HashMap<String, StockData>, HashMap<String, FusionResult>) {
        let fetches = codes.iter().map(|code| async move {
            let (quote, scores) = futures_util::join!(self.market.quote(code), self.scorer.scores(code));
            let fused = self.fusion.fuse_or_fallback(&scores, Some(code.as_str()));
            (code.clone(), quote, fused)
        });

        let mut quotes = HashMap::new();
        let mut fused = HashMap::new();
        for (code, quote, result) in join_all(fetches).await {
            if let Some(quote) = quote {
                quotes.insert(code.clone(), quote);
            }
            if let Some(result) = result {
                fused.insert(code, result);
            }
        }
        (quotes, fused)
    }

    /// Scores a universe of codes and keeps those that pass the admission
    /// filter and have a live quote.
    pub async fn screen_candidates(&self, codes: &[String]) -> Vec<CandidateStock> {
        let (quotes, fused) = self.gather(codes).await;
        let mut candidates: Vec<CandidateStock> = codes
            .iter()
            .filter_map(|code| {
                let result = fused.get(code).filter(|r| r.passed_filter)?;
                let quote = quotes.get(code)?;
                Some(
                    CandidateStock::new(code.clone(), quote.name.clone(), result.total_score, quote.current_price)
                        .with_reason(format!("fusion: {}", result.strategy_name))
                        .with_reason(format!("recommendation: {}", result.recommendation)),
                )
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        info!(universe = codes.len(), candidates = candidates.len(), "Candidates screened");
        candidates
    }

    // =========================================================================
    // Sell pass
    // =========================================================================

    /// Analyzes every holding and executes the approved sells.
    ///
    /// # Errors
    ///
    /// Returns an error if the position store or executor fails, or if an
    /// executed trade cannot be journaled.
    pub async fn run_sell_pass(&mut self) -> Result<PassReport> {
        if self.risk.is_halted() {
            warn!("Circuit breaker active, sell pass skipped");
            return Ok(PassReport::halted());
        }

        let mut positions = self.store.positions().await?;
        let portfolio_value = self.store.portfolio_value().await?;
        let codes: Vec<String> = positions.iter().map(|p| p.code.clone()).collect();
        let (quotes, fused) = self.gather(&codes).await;
        for position in &mut positions {
            if let Some(quote) = quotes.get(&position.code) {
                position.current_price = Some(quote.current_price);
            }
        }
        let composites: HashMap<String, CompositeScore> = fused
            .iter()
            .map(|(code, result)| (code.clone(), result.composite()))
            .collect();

        let signals = self.decision.analyze_positions_batch(&positions, &quotes, &composites);
        let sells = DecisionEngine::filter_sell_signals(&signals);
        let mut report = PassReport {
            signals: sells.len(),
            ..PassReport::default()
        };

        for signal in &sells {
            let Some(position) = positions.iter().find(|p| p.code == signal.stock_code) else {
                report.skip(&signal.stock_code, SkipReason::UnknownPosition);
                continue;
            };

            let check = self.risk.check_trade_permission(signal, Some(position), portfolio_value);
            if !check.passed {
                report.skip(
                    &signal.stock_code,
                    SkipReason::Risk {
                        level: check.risk_level,
                        errors: check.errors,
                    },
                );
                if self.risk.is_halted() {
                    warn!("Circuit breaker tripped, stopping sell pass");
                    report.halted = true;
                    break;
                }
                continue;
            }

            match self.execute_sell(signal, position).await? {
                Some((kind, quantity, price)) => {
                    let profit_loss = (price - position.cost_price) * Decimal::from(quantity);
                    let record = self.risk.record_trade(
                        &signal.stock_code,
                        &signal.stock_name,
                        kind,
                        quantity,
                        price,
                        profit_loss,
                    )?;
                    report.executed.push(record);
                }
                None => report.skip(&signal.stock_code, SkipReason::Unfilled),
            }
        }

        info!(
            signals = report.signals,
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            dry_run = self.dry_run,
            "Sell pass complete"
        );
        Ok(report)
    }

    async fn execute_sell(
        &self,
        signal: &TradeSignal,
        position: &Position,
    ) -> Result<Option<(TradeKind, u64, Decimal)>> {
        if self.dry_run {
            let price = signal
                .price
                .or(position.current_price)
                .unwrap_or(position.cost_price);
            info!(code = %signal.stock_code, quantity = signal.quantity, price = %price, "Simulated sell");
            return Ok(Some((TradeKind::SimulatedSell, signal.quantity, price)));
        }

        let fill = self.executor.sell(signal).await?;
        if fill.is_none() {
            warn!(code = %signal.stock_code, "Sell did not fill");
        }
        Ok(fill.map(|f| (TradeKind::Sell, f.quantity, f.price)))
    }

    // =========================================================================
    // Buy pass
    // =========================================================================

    /// Sizes `candidates` and executes the approved buys.
    ///
    /// The buy-interval throttle usually admits one buy per pass; later
    /// signals come back as risk skips carrying `wait_seconds` in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the position store or executor fails, or if an
    /// executed trade cannot be journaled.
    pub async fn run_buy_pass(&mut self, candidates: &[CandidateStock]) -> Result<PassReport> {
        if self.risk.is_halted() {
            warn!("Circuit breaker active, buy pass skipped");
            return Ok(PassReport::halted());
        }

        let mut positions = self.store.positions().await?;
        let mut cash = self.store.available_cash().await?;
        let total_capital = self.portfolio.total_capital();

        let usable = self
            .portfolio
            .calculate_available_cash(&positions, None)
            .min(cash);
        let recommendations =
            self.portfolio
                .allocate_positions(candidates, usable, &positions, self.allocation);
        let recommendations = self.portfolio.optimize_portfolio(recommendations, &positions);
        let signals = self
            .portfolio
            .build_buy_signals(&recommendations, self.clock.now());

        let mut report = PassReport {
            signals: signals.len(),
            ..PassReport::default()
        };

        for signal in &signals {
            let quote = self.market.quote(&signal.stock_code).await;
            if let Err(errors) = self.portfolio.validate_buy_signal(signal, quote.as_ref()) {
                report.skip(&signal.stock_code, SkipReason::Invalid { errors });
                continue;
            }

            let check = self
                .risk
                .check_buy_permission(signal, &positions, cash, total_capital);
            if !check.passed {
                report.skip(
                    &signal.stock_code,
                    SkipReason::Risk {
                        level: check.risk_level,
                        errors: check.errors,
                    },
                );
                if self.risk.is_halted() {
                    report.halted = true;
                    break;
                }
                continue;
            }

            let Some(rec) = recommendations.iter().find(|r| r.code == signal.stock_code) else {
                continue;
            };
            match self.execute_buy(signal, rec).await? {
                Some((kind, quantity, price)) => {
                    let record = self.risk.record_trade(
                        &signal.stock_code,
                        &signal.stock_name,
                        kind,
                        quantity,
                        price,
                        Decimal::ZERO,
                    )?;
                    cash -= record.amount;
                    positions.push(
                        Position::new(&signal.stock_code, &signal.stock_name, quantity, price)
                            .with_current_price(price)
                            .with_holding_days(0),
                    );
                    report.executed.push(record);
                }
                None => report.skip(&signal.stock_code, SkipReason::Unfilled),
            }
        }

        info!(
            signals = report.signals,
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            dry_run = self.dry_run,
            "Buy pass complete"
        );
        Ok(report)
    }

    async fn execute_buy(
        &self,
        signal: &BuySignal,
        rec: &BuyRecommendation,
    ) -> Result<Option<(TradeKind, u64, Decimal)>> {
        if self.dry_run {
            info!(code = %signal.stock_code, quantity = signal.quantity, price = %signal.price, "Simulated buy");
            return Ok(Some((TradeKind::SimulatedBuy, signal.quantity, signal.price)));
        }

        let fill = self.executor.buy(rec).await?;
        if fill.is_none() {
            warn!(code = %signal.stock_code, "Buy did not fill");
        }
        Ok(fill.map(|f| (TradeKind::Buy, f.quantity, f.price)))
    }
}
