//! Deserializable config shape and its conversion into `bt_types::BacktestConfig`.
//! Every field is optional; absent fields fall back to
//! `BacktestConfig::production_defaults`, layering a partial YAML document
//! over hardcoded defaults rather than requiring every key to be spelled out.

use bt_types::{BacktestConfig, CostModel, DynamicOptConfig, Error, RiskConfig, Symbol};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigFile {
    pub backtest: Option<BacktestSection>,
    pub risk: Option<RiskSection>,
    pub optimizer: Option<OptimizerSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BacktestSection {
    pub initial_capital: Option<f64>,
    pub cost_model: Option<String>,
    pub commission_rate: Option<f64>,
    pub fixed_cost: Option<f64>,
    pub slippage_bps: Option<i64>,
    pub market_impact_bps: Option<i64>,
    pub per_contract_commission: Option<f64>,
    pub impact_coefficient: Option<f64>,
    pub volatility_coefficient: Option<f64>,
    pub use_risk_management: Option<bool>,
    pub use_optimization: Option<bool>,
    pub max_history_length: Option<usize>,
    pub min_periods_for_covariance: Option<usize>,
    pub default_variance: Option<f64>,
    pub warmup_days: Option<usize>,
    pub store_trade_details: Option<bool>,
    pub calc_risk_metrics: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RiskSection {
    pub portfolio_var_limit: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub jump_risk_threshold: Option<f64>,
    pub use_historical_jumps: Option<bool>,
    pub max_correlation: Option<f64>,
    pub correlation_lookback: Option<usize>,
    pub max_gross_leverage: Option<f64>,
    pub max_net_leverage: Option<f64>,
    pub capital: Option<f64>,
    pub confidence_level: Option<f64>,
    pub lookback_period: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OptimizerSection {
    pub tau: Option<f64>,
    pub cost_penalty_scalar: Option<f64>,
    pub asymmetric_risk_buffer: Option<f64>,
    pub max_iterations: Option<u32>,
    pub convergence_threshold: Option<f64>,
}

impl ConfigFile {
    pub fn from_json(v: &Value) -> Result<Self, Error> {
        serde_json::from_value(v.clone())
            .map_err(|e| Error::InvalidData(format!("config does not match expected shape: {e}")))
    }

    /// Layers this file's present fields over `BacktestConfig::production_defaults`
    /// for `symbols`, with the CLI-resolved `start_day`/`end_day` day ids.
    pub fn into_backtest_config(
        self,
        symbols: Vec<Symbol>,
        start_day: i64,
        end_day: i64,
    ) -> Result<BacktestConfig, Error> {
        let mut cfg = BacktestConfig::production_defaults(symbols);
        cfg.start_day = start_day;
        cfg.end_day = end_day;

        if let Some(b) = self.backtest {
            if let Some(v) = b.initial_capital {
                cfg.initial_capital = bt_types::Decimal::from_f64(v);
            }
            if let Some(v) = b.cost_model {
                cfg.cost_model = parse_cost_model(&v)?;
            }
            if let Some(v) = b.commission_rate {
                cfg.commission_rate = bt_types::Decimal::from_f64(v);
            }
            if let Some(v) = b.fixed_cost {
                cfg.fixed_cost = bt_types::Decimal::from_f64(v);
            }
            if let Some(v) = b.slippage_bps {
                cfg.slippage_bps = v;
            }
            if let Some(v) = b.market_impact_bps {
                cfg.market_impact_bps = v;
            }
            if let Some(v) = b.per_contract_commission {
                cfg.per_contract_commission = bt_types::Decimal::from_f64(v);
            }
            if let Some(v) = b.impact_coefficient {
                cfg.impact_coefficient = v;
            }
            if let Some(v) = b.volatility_coefficient {
                cfg.volatility_coefficient = v;
            }
            if let Some(v) = b.use_risk_management {
                cfg.use_risk_management = v;
            }
            if let Some(v) = b.use_optimization {
                cfg.use_optimization = v;
            }
            if let Some(v) = b.max_history_length {
                cfg.max_history_length = v;
            }
            if let Some(v) = b.min_periods_for_covariance {
                cfg.min_periods_for_covariance = v;
            }
            if let Some(v) = b.default_variance {
                cfg.default_variance = v;
            }
            if let Some(v) = b.warmup_days {
                cfg.warmup_days = v;
            }
            if let Some(v) = b.store_trade_details {
                cfg.store_trade_details = v;
            }
            if let Some(v) = b.calc_risk_metrics {
                cfg.calc_risk_metrics = v;
            }
        }

        if let Some(r) = self.risk {
            apply_risk_section(&mut cfg.risk_config, r);
        }

        if let Some(o) = self.optimizer {
            apply_optimizer_section(&mut cfg.opt_config, o);
        }

        validate(&cfg)?;
        Ok(cfg)
    }
}

fn parse_cost_model(s: &str) -> Result<CostModel, Error> {
    match s.to_ascii_lowercase().as_str() {
        "new" => Ok(CostModel::New),
        "legacy" => Ok(CostModel::Legacy),
        other => Err(Error::InvalidArgument(format!(
            "unknown cost_model {other:?}, expected \"new\" or \"legacy\""
        ))),
    }
}

fn apply_risk_section(cfg: &mut RiskConfig, r: RiskSection) {
    if let Some(v) = r.portfolio_var_limit {
        cfg.portfolio_var_limit = v;
    }
    if let Some(v) = r.max_drawdown {
        cfg.max_drawdown = v;
    }
    if let Some(v) = r.jump_risk_threshold {
        cfg.jump_risk_threshold = v;
    }
    if let Some(v) = r.use_historical_jumps {
        cfg.use_historical_jumps = v;
    }
    if let Some(v) = r.max_correlation {
        cfg.max_correlation = v;
    }
    if let Some(v) = r.correlation_lookback {
        cfg.correlation_lookback = v;
    }
    if let Some(v) = r.max_gross_leverage {
        cfg.max_gross_leverage = v;
    }
    if let Some(v) = r.max_net_leverage {
        cfg.max_net_leverage = v;
    }
    if let Some(v) = r.capital {
        cfg.capital = v;
    }
    if let Some(v) = r.confidence_level {
        cfg.confidence_level = v;
    }
    if let Some(v) = r.lookback_period {
        cfg.lookback_period = v;
    }
}

fn apply_optimizer_section(cfg: &mut DynamicOptConfig, o: OptimizerSection) {
    if let Some(v) = o.tau {
        cfg.tau = v;
    }
    if let Some(v) = o.cost_penalty_scalar {
        cfg.cost_penalty_scalar = v;
    }
    if let Some(v) = o.asymmetric_risk_buffer {
        cfg.asymmetric_risk_buffer = v;
    }
    if let Some(v) = o.max_iterations {
        cfg.max_iterations = v;
    }
    if let Some(v) = o.convergence_threshold {
        cfg.convergence_threshold = v;
    }
}

/// Rejects a config that would silently produce degenerate backtests.
fn validate(cfg: &BacktestConfig) -> Result<(), Error> {
    if cfg.start_day > cfg.end_day {
        return Err(Error::InvalidArgument(format!(
            "start_day ({}) is after end_day ({})",
            cfg.start_day, cfg.end_day
        )));
    }
    if cfg.symbols.is_empty() {
        return Err(Error::InvalidArgument("at least one symbol is required".into()));
    }
    if cfg.opt_config.tau <= 0.0 {
        return Err(Error::InvalidArgument("optimizer.tau must be positive".into()));
    }
    Ok(())
}
