//! bt-coordinator
//!
//! Owns the per-day simulation state machine: wires the instrument
//! registry, P&L manager, execution manager, portfolio constraints, and
//! metrics calculator around a `Strategy` and `MarketDataProvider`.
//! Single-threaded, cooperative, sequential — no intraday cancellation,
//! no component sharing across coordinator instances.
//!
//! Beginning-of-day fill model: a day's position delta (after risk
//! scaling and optimization have been applied to the strategy's targets)
//! is executed at *yesterday's* close, not today's — the decision is made
//! using today's bar, but priced as if placed before today's bar printed.
//! The first day with no remembered previous-day bars is the warmup-seed
//! day: the strategy's initial positions are snapshotted with no fills
//! and no P&L, since there is no previous close to execute against or
//! mark against yet.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use bt_execution::ExecutionManager;
use bt_metrics::MetricsCalculator;
use bt_pnl::PnLManager;
use bt_portfolio::PortfolioConstraints;
use bt_risk::RiskManager;
use bt_types::{
    BacktestConfig, BacktestResults, Bar, Decimal, Error, InstrumentRegistry, MarkMap,
    MarketDataProvider, PositionBook, Result, Strategy, StrategyInitContext,
};

pub struct BacktestCoordinator<R, M, S>
where
    R: InstrumentRegistry,
    M: MarketDataProvider,
    S: Strategy,
{
    config: BacktestConfig,
    registry: R,
    market_data: M,
    strategy: S,
    pnl_manager: PnLManager,
    execution_manager: ExecutionManager,
    portfolio_constraints: PortfolioConstraints,
    risk_manager: RiskManager,
    metrics_calculator: MetricsCalculator,
}

fn day_to_date_string(day_id: i64) -> String {
    match NaiveDate::from_num_days_from_ce_opt(day_id as i32) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => day_id.to_string(),
    }
}

fn closes_of(bars: &[Bar]) -> MarkMap {
    bars.iter().map(|b| (b.symbol.clone(), b.close)).collect()
}

impl<R, M, S> BacktestCoordinator<R, M, S>
where
    R: InstrumentRegistry,
    M: MarketDataProvider,
    S: Strategy,
{
    pub fn new(config: BacktestConfig, registry: R, market_data: M, strategy: S) -> Self {
        let pnl_manager = PnLManager::new(config.initial_capital);
        let execution_manager = ExecutionManager::new(&config);
        let portfolio_constraints = PortfolioConstraints::from_config(&config);
        let risk_manager = RiskManager::new(config.risk_config.clone());
        let metrics_calculator = MetricsCalculator::default();

        BacktestCoordinator {
            config,
            registry,
            market_data,
            strategy,
            pnl_manager,
            execution_manager,
            portfolio_constraints,
            risk_manager,
            metrics_calculator,
        }
    }

    /// Runs the full day loop from `config.start_day` to `config.end_day`
    /// inclusive. `is_cancelled` is polled only between days, never
    /// mid-day.
    pub fn run(&mut self, is_cancelled: impl Fn() -> bool) -> Result<BacktestResults> {
        let ctx = StrategyInitContext {
            symbols: self.config.symbols.clone(),
            initial_capital: self.config.initial_capital.to_f64(),
        };
        self.strategy.initialize(&ctx)?;
        self.strategy.start()?;

        let mut previous_positions = PositionBook::new();
        let mut previous_closes: Option<MarkMap> = None;
        let mut all_fills = Vec::new();
        let mut equity_curve = Vec::new();
        let mut risk_metrics = Vec::new();

        for day_id in self.config.start_day..=self.config.end_day {
            if is_cancelled() {
                return Err(Error::Cancelled);
            }

            let bars = self.market_data.bars_for_day(day_id, &self.config.symbols)?;
            let complete_bars: Vec<Bar> = bars
                .into_iter()
                .filter(|bar| {
                    if bar.is_complete {
                        true
                    } else {
                        tracing::warn!(symbol = %bar.symbol, day_id, "incomplete bar, skipping symbol for the day");
                        false
                    }
                })
                .collect();
            let closes_today = closes_of(&complete_bars);

            // Step 1: warmup-seed day — no remembered previous-day bars.
            // Hand bars to the strategy, snapshot its resulting positions,
            // remember today's closes, append the initial equity point.
            let Some(exec_prices) = previous_closes.clone() else {
                self.strategy.on_data(&complete_bars)?;
                previous_positions = self
                    .strategy
                    .get_target_positions()
                    .unwrap_or_else(|| self.strategy.get_positions());
                self.pnl_manager.update_previous_closes(&closes_today);
                equity_curve.push((day_id, self.pnl_manager.get_portfolio_value()));
                previous_closes = Some(closes_today);
                continue;
            };

            // Step 2-3: strategy updates state on today's bars, coordinator
            // reads its target positions.
            self.strategy.on_data(&complete_bars)?;
            let mut new_positions = self
                .strategy
                .get_target_positions()
                .unwrap_or_else(|| self.strategy.get_positions());

            // Step 4: risk scaling then optimization, mutating the targets
            // in place, using today's bars.
            let risk_result = if self.config.use_risk_management || self.config.use_optimization {
                let (constrained, result) = self.portfolio_constraints.apply_constraints(
                    &new_positions,
                    &complete_bars,
                    &closes_today,
                    &mut self.risk_manager,
                    &self.config,
                );
                new_positions = constrained;
                result
            } else {
                None
            };

            // Step 5: fills priced at yesterday's close (BOD model), diffing
            // against yesterday's position book.
            let fills = self.execution_manager.generate_executions(
                &previous_positions,
                &new_positions,
                &exec_prices,
                day_id,
            );
            let commissions = fills.iter().fold(Decimal::ZERO, |acc, f| acc + f.total_transaction_costs);
            if self.config.store_trade_details {
                all_fills.extend(fills);
            }

            // Step 6: P&L uses yesterday's positions against close_{T-1} ->
            // close_T, which is exactly what the PnLManager's previous-close
            // store (not yet updated for today) and today's closes give us.
            let date_str = day_to_date_string(day_id);
            let pnl = self.pnl_manager.calculate_daily_pnl(
                &self.registry,
                &date_str,
                &previous_positions,
                &closes_today,
                commissions,
            );
            equity_curve.push((day_id, pnl.new_portfolio_value));

            // Step 7: seed tomorrow's previous-close store from today's bars.
            self.pnl_manager.update_previous_closes(&closes_today);
            for bar in &complete_bars {
                let prev_close = exec_prices.get(&bar.symbol).copied().unwrap_or(bar.close).to_f64();
                self.execution_manager
                    .update_market_data(&bar.symbol, bar.volume, bar.close.to_f64(), prev_close);
            }

            if self.config.calc_risk_metrics {
                if let Some(result) = risk_result {
                    risk_metrics.push((day_id, result));
                }
            }

            // Step 8: today's (constrained) targets become tomorrow's
            // previous positions; today's closes become tomorrow's
            // previous-day execution prices.
            previous_positions = new_positions;
            previous_closes = Some(closes_today);
        }

        self.strategy.stop()?;

        let mut results = self.metrics_calculator.calculate_all_metrics(&equity_curve, &all_fills, self.config.warmup_days);
        results.positions = previous_positions
            .iter()
            .map(|(symbol, &quantity)| bt_types::Position {
                symbol: symbol.clone(),
                quantity,
            })
            .collect();
        results.risk_metrics = risk_metrics;
        Ok(results)
    }
}
