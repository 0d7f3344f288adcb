use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Decimal;

/// A ticker/contract symbol. Cheap to clone; used as a `BTreeMap` key
/// everywhere positions, marks, and return histories are keyed, so
/// iteration order (and therefore every aggregate sum) is deterministic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol(s)
    }
}

/// Position book keyed by symbol, signed quantity (+long, -short, 0 flat).
pub type PositionBook = BTreeMap<Symbol, i64>;

/// Mark/close-price map keyed by symbol.
pub type MarkMap = BTreeMap<Symbol, Decimal>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_signed_delta(delta: i64) -> Option<Side> {
        if delta > 0 {
            Some(Side::Buy)
        } else if delta < 0 {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A single full-bar market data point. Bars marked `is_complete = false`
/// must never be used for fills or closes: the fill model is
/// beginning-of-day only, there is no partial-bar/intraday support.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub day_id: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub is_complete: bool,
}

impl Bar {
    pub fn new(
        symbol: impl Into<Symbol>,
        day_id: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
        is_complete: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            day_id,
            open,
            high,
            low,
            close,
            volume,
            is_complete,
        }
    }
}

/// A completed position snapshot at report time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: i64,
}

/// A single simulated execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: i64,
    pub fill_price: Decimal,
    pub commissions_fees: Decimal,
    pub implicit_price_impact: Decimal,
    pub slippage_market_impact: Decimal,
    pub total_transaction_costs: Decimal,
    pub order_id: String,
    pub exec_id: String,
    pub day_id: i64,
}

/// Result of pricing a single symbol's daily P&L.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionPnlResult {
    pub symbol: Symbol,
    pub quantity: i64,
    pub previous_close: Decimal,
    pub current_close: Decimal,
    pub point_value: f64,
    pub daily_pnl: Decimal,
    pub valid: bool,
    pub error_message: Option<String>,
}

/// Result of pricing a full day's book.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyPnlResult {
    pub total_daily_pnl: Decimal,
    pub total_commissions: Decimal,
    pub net_daily_pnl: Decimal,
    pub new_portfolio_value: Decimal,
    pub position_results: BTreeMap<Symbol, PositionPnlResult>,
    pub date: String,
    pub success: bool,
}

/// The four independent risk multipliers plus the overall recommendation.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskResult {
    pub risk_exceeded: bool,
    pub recommended_scale: f64,
    pub portfolio_risk: f64,
    pub jump_risk: f64,
    pub correlation_risk: f64,
    pub leverage_risk: f64,
    pub portfolio_multiplier: f64,
    pub jump_multiplier: f64,
    pub correlation_multiplier: f64,
    pub leverage_multiplier: f64,
    pub max_portfolio_risk: f64,
    pub max_jump_risk: f64,
    pub max_correlation_risk: f64,
    pub max_leverage: f64,
}

impl RiskResult {
    /// The no-op result: nothing is scaled down.
    pub fn unconstrained() -> Self {
        RiskResult {
            risk_exceeded: false,
            recommended_scale: 1.0,
            portfolio_multiplier: 1.0,
            jump_multiplier: 1.0,
            correlation_multiplier: 1.0,
            leverage_multiplier: 1.0,
            ..Default::default()
        }
    }
}

/// Result of one coordinate-descent optimization pass.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationResult {
    pub positions: Vec<f64>,
    pub tracking_error: f64,
    pub cost_penalty: f64,
    pub iterations: u32,
    pub converged: bool,
}

/// Which transaction cost model a run uses. Fixed once at construction;
/// never switched mid-run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostModel {
    /// Rolling ADV/volatility cost estimate; `fill_price` stays the pure
    /// reference execution price.
    New,
    /// Slippage embedded directly into `fill_price`; flat commission rate
    /// plus fixed cost.
    Legacy,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DynamicOptConfig {
    pub tau: f64,
    pub cost_penalty_scalar: f64,
    pub asymmetric_risk_buffer: f64,
    pub max_iterations: u32,
    pub convergence_threshold: f64,
}

impl Default for DynamicOptConfig {
    fn default() -> Self {
        DynamicOptConfig {
            tau: 1.0,
            cost_penalty_scalar: 50.0,
            asymmetric_risk_buffer: 0.1,
            max_iterations: 100,
            convergence_threshold: 1e-6,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RiskConfig {
    pub portfolio_var_limit: f64,
    pub max_drawdown: f64,
    pub jump_risk_threshold: f64,
    pub use_historical_jumps: bool,
    pub max_correlation: f64,
    pub correlation_lookback: usize,
    pub max_gross_leverage: f64,
    pub max_net_leverage: f64,
    pub capital: f64,
    pub confidence_level: f64,
    pub lookback_period: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            portfolio_var_limit: 0.15,
            max_drawdown: 0.20,
            jump_risk_threshold: 0.10,
            use_historical_jumps: true,
            max_correlation: 0.7,
            correlation_lookback: 252,
            max_gross_leverage: 4.0,
            max_net_leverage: 2.0,
            capital: 0.0,
            confidence_level: 0.99,
            lookback_period: 252,
        }
    }
}

/// Top-level run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    pub start_day: i64,
    pub end_day: i64,
    pub symbols: Vec<Symbol>,
    pub initial_capital: Decimal,
    pub cost_model: CostModel,
    /// Legacy model only: per-contract commission rate.
    pub commission_rate: Decimal,
    /// Legacy model only: fixed cost added per fill regardless of size.
    pub fixed_cost: Decimal,
    /// Legacy model only: basis points applied to the reference price to
    /// derive the fill price (`fill = ref * (1 ± slippage_bps/1e4)`).
    pub slippage_bps: i64,
    /// Legacy model only: basis points of implicit market impact charged
    /// as a cost, independent of the fill-price slippage above.
    pub market_impact_bps: i64,
    /// New model only: flat per-contract commission.
    pub per_contract_commission: Decimal,
    /// New model only: linear impact coefficient against ADV participation.
    pub impact_coefficient: f64,
    /// New model only: volatility scaling coefficient.
    pub volatility_coefficient: f64,
    pub use_risk_management: bool,
    pub risk_config: RiskConfig,
    pub use_optimization: bool,
    pub opt_config: DynamicOptConfig,
    pub max_history_length: usize,
    pub min_periods_for_covariance: usize,
    pub default_variance: f64,
    /// Number of leading equity-curve points excluded from metrics
    /// calculations (still present in the stored curve).
    pub warmup_days: usize,
    pub store_trade_details: bool,
    pub calc_risk_metrics: bool,
}

impl BacktestConfig {
    /// Small, deterministic, cheap defaults for unit tests: legacy cost
    /// model, risk and optimization both off, no warmup.
    pub fn test_defaults(symbols: Vec<Symbol>) -> Self {
        BacktestConfig {
            start_day: 0,
            end_day: 0,
            symbols,
            initial_capital: Decimal::from_f64(1_000_000.0),
            cost_model: CostModel::Legacy,
            commission_rate: Decimal::from_f64(0.0),
            fixed_cost: Decimal::from_f64(0.0),
            slippage_bps: 0,
            market_impact_bps: 0,
            per_contract_commission: Decimal::from_f64(0.0),
            impact_coefficient: 0.0,
            volatility_coefficient: 0.0,
            use_risk_management: false,
            risk_config: RiskConfig::default(),
            use_optimization: false,
            opt_config: DynamicOptConfig::default(),
            max_history_length: 252,
            min_periods_for_covariance: 20,
            default_variance: 0.0001,
            warmup_days: 0,
            store_trade_details: true,
            calc_risk_metrics: false,
        }
    }

    /// Full risk management and optimization enabled, new cost model,
    /// 252-day lookbacks — the defaults a production run should start
    /// from.
    pub fn production_defaults(symbols: Vec<Symbol>) -> Self {
        BacktestConfig {
            start_day: 0,
            end_day: 0,
            symbols,
            initial_capital: Decimal::from_f64(1_000_000.0),
            cost_model: CostModel::New,
            commission_rate: Decimal::from_f64(0.0),
            fixed_cost: Decimal::from_f64(0.0),
            slippage_bps: 0,
            market_impact_bps: 0,
            per_contract_commission: Decimal::from_f64(2.5),
            impact_coefficient: 0.1,
            volatility_coefficient: 0.05,
            use_risk_management: true,
            risk_config: RiskConfig::default(),
            use_optimization: true,
            opt_config: DynamicOptConfig::default(),
            max_history_length: 252,
            min_periods_for_covariance: 20,
            default_variance: 0.0001,
            warmup_days: 20,
            store_trade_details: true,
            calc_risk_metrics: true,
        }
    }
}

/// The composite report produced at the end of a run.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestResults {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,
    pub volatility: f64,
    pub total_trades: u64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_win: f64,
    pub max_loss: f64,
    pub avg_holding_period: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub beta: f64,
    pub correlation: f64,
    pub downside_volatility: f64,
    pub executions: Vec<Fill>,
    pub positions: Vec<Position>,
    pub equity_curve: Vec<(i64, Decimal)>,
    pub drawdown_curve: Vec<(i64, f64)>,
    pub monthly_returns: BTreeMap<String, f64>,
    pub symbol_pnl: BTreeMap<Symbol, Decimal>,
    pub risk_metrics: Vec<(i64, RiskResult)>,
}
