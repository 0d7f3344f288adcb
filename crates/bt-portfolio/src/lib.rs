//! bt-portfolio
//!
//! Orchestrates the risk-then-optimize pipeline and maintains the rolling
//! price/return history the optimizer's covariance matrix is built from.
//! Position scaling from a risk breach always happens before the
//! optimizer runs; an optimizer failure never blocks a day (Testable
//! Property) — `apply_constraints` falls back to the pre-optimization
//! (risk-scaled) positions and logs a warning instead of propagating the
//! error.

use std::collections::BTreeMap;

use bt_optimizer::Matrix;
use bt_risk::RiskManager;
use bt_types::{Bar, BacktestConfig, MarkMap, PositionBook, RiskResult, Symbol};

#[derive(Clone, Debug, Default)]
pub struct PortfolioConstraints {
    max_history_length: usize,
    min_periods_for_covariance: usize,
    default_variance: f64,
    price_history: BTreeMap<Symbol, Vec<f64>>,
    returns_history: BTreeMap<Symbol, Vec<f64>>,
}

impl PortfolioConstraints {
    pub fn new(max_history_length: usize, min_periods_for_covariance: usize, default_variance: f64) -> Self {
        PortfolioConstraints {
            max_history_length,
            min_periods_for_covariance,
            default_variance,
            price_history: BTreeMap::new(),
            returns_history: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.max_history_length, config.min_periods_for_covariance, config.default_variance)
    }

    /// Appends today's close to each symbol's bounded price history and
    /// recomputes simple relative returns, dropping non-finite results.
    pub fn update_historical_returns(&mut self, closes: &MarkMap) {
        for (symbol, price) in closes {
            let prices = self.price_history.entry(symbol.clone()).or_default();
            prices.push(price.to_f64());
            if prices.len() > self.max_history_length + 1 {
                let excess = prices.len() - (self.max_history_length + 1);
                prices.drain(0..excess);
            }

            let mut returns: Vec<f64> = prices
                .windows(2)
                .filter_map(|w| {
                    let (prev, cur) = (w[0], w[1]);
                    if prev > 0.0 {
                        let r = (cur - prev) / prev;
                        if r.is_finite() {
                            return Some(r);
                        }
                    }
                    None
                })
                .collect();
            if returns.len() > self.max_history_length {
                let excess = returns.len() - self.max_history_length;
                returns.drain(0..excess);
            }
            self.returns_history.insert(symbol.clone(), returns);
        }
    }

    /// Common overlapping window across `symbols`' return histories; a
    /// diagonal `default_variance` matrix if there isn't enough overlap.
    pub fn calculate_covariance_matrix(&self, symbols: &[Symbol]) -> Matrix {
        let n = symbols.len();
        let min_periods = symbols
            .iter()
            .map(|s| self.returns_history.get(s).map(|r| r.len()).unwrap_or(0))
            .min()
            .unwrap_or(0);

        if min_periods < self.min_periods_for_covariance {
            return Matrix::diagonal(n, self.default_variance);
        }

        let windows: Vec<&[f64]> = symbols
            .iter()
            .map(|s| {
                let r = &self.returns_history[s];
                &r[r.len() - min_periods..]
            })
            .collect();
        let means: Vec<f64> = windows.iter().map(|w| w.iter().sum::<f64>() / min_periods as f64).collect();

        let mut cov = Matrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                let mut acc = 0.0;
                for t in 0..min_periods {
                    acc += (windows[i][t] - means[i]) * (windows[j][t] - means[j]);
                }
                let denom = if min_periods > 1 { (min_periods - 1) as f64 } else { 1.0 };
                cov.set(i, j, acc / denom);
            }
        }
        cov
    }

    /// Risk-then-optimize pipeline for one day. Returns the final
    /// positions to trade toward and the day's `RiskResult`, if risk
    /// management was enabled.
    pub fn apply_constraints(
        &mut self,
        current_positions: &PositionBook,
        bars: &[Bar],
        closes: &MarkMap,
        risk_manager: &mut RiskManager,
        config: &BacktestConfig,
    ) -> (PositionBook, Option<RiskResult>) {
        let (mut positions, risk_result) = if config.use_risk_management {
            risk_manager.update_market_data(bars);
            let result = risk_manager.process_positions(current_positions, closes);
            let scaled = if result.risk_exceeded {
                tracing::warn!(scale = result.recommended_scale, "risk limit exceeded, scaling positions");
                scale_positions(current_positions, result.recommended_scale)
            } else {
                current_positions.clone()
            };
            (scaled, Some(result))
        } else {
            (current_positions.clone(), None)
        };

        let nonzero_symbols: Vec<Symbol> = positions
            .iter()
            .filter(|&(_, &qty)| qty != 0)
            .map(|(s, _)| s.clone())
            .collect();

        if config.use_optimization && nonzero_symbols.len() > 1 {
            let current_f64: Vec<f64> = nonzero_symbols.iter().map(|s| positions[s] as f64).collect();
            let target_f64 = current_f64.clone();
            let costs = vec![0.0; nonzero_symbols.len()];
            let weights = vec![1.0; nonzero_symbols.len()];
            let covariance = self.calculate_covariance_matrix(&nonzero_symbols);

            match bt_optimizer::optimize(&current_f64, &target_f64, &covariance, &costs, &weights, &config.opt_config) {
                Ok(result) => {
                    for (symbol, value) in nonzero_symbols.iter().zip(result.positions.iter()) {
                        positions.insert(symbol.clone(), *value as i64);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "optimizer failed, falling back to pre-optimization positions");
                }
            }
        }

        self.update_historical_returns(closes);

        (positions, risk_result)
    }
}

fn scale_positions(positions: &PositionBook, scale: f64) -> PositionBook {
    positions
        .iter()
        .map(|(symbol, &qty)| (symbol.clone(), (qty as f64 * scale).round() as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_types::{CostModel, Decimal, RiskConfig};

    fn closes(pairs: &[(&str, f64)]) -> MarkMap {
        pairs.iter().map(|(s, p)| (Symbol::new(*s), Decimal::from_f64(*p))).collect()
    }

    #[test]
    fn insufficient_history_falls_back_to_diagonal_default_variance() {
        let pc = PortfolioConstraints::new(252, 20, 0.0001);
        let cov = pc.calculate_covariance_matrix(&[Symbol::new("ES"), Symbol::new("NQ")]);
        assert_eq!(cov.get(0, 0), 0.0001);
        assert_eq!(cov.get(0, 1), 0.0);
    }

    #[test]
    fn enough_history_produces_nonzero_off_diagonal_covariance() {
        let mut pc = PortfolioConstraints::new(252, 3, 0.0001);
        let series = [
            (100.0, 100.0),
            (101.0, 102.0),
            (99.0, 98.0),
            (103.0, 105.0),
            (97.0, 95.0),
        ];
        for (es, nq) in series {
            pc.update_historical_returns(&closes(&[("ES", es), ("NQ", nq)]));
        }
        let cov = pc.calculate_covariance_matrix(&[Symbol::new("ES"), Symbol::new("NQ")]);
        assert!(cov.get(0, 1) > 0.0);
    }

    #[test]
    fn optimizer_failure_never_blocks_a_day() {
        let mut pc = PortfolioConstraints::new(252, 20, 0.0001);
        let mut cfg = BacktestConfig::test_defaults(vec![Symbol::new("A"), Symbol::new("B")]);
        cfg.cost_model = CostModel::Legacy;
        cfg.use_optimization = true;
        cfg.opt_config.tau = -1.0; // invalid -> optimize() returns Err

        let mut current = PositionBook::new();
        current.insert(Symbol::new("A"), 2);
        current.insert(Symbol::new("B"), 3);
        let bars = vec![];
        let marks = closes(&[("A", 100.0), ("B", 50.0)]);
        let mut risk_manager = RiskManager::new(RiskConfig::default());

        let (positions, risk_result) = pc.apply_constraints(&current, &bars, &marks, &mut risk_manager, &cfg);
        assert!(risk_result.is_none());
        assert_eq!(positions, current);
    }

    #[test]
    fn risk_exceeded_scales_positions_before_optimization() {
        let mut pc = PortfolioConstraints::new(252, 20, 0.0001);
        let mut cfg = BacktestConfig::test_defaults(vec![Symbol::new("A"), Symbol::new("B")]);
        cfg.use_risk_management = true;
        cfg.risk_config.capital = 100_000.0;
        cfg.risk_config.max_gross_leverage = 4.0;
        cfg.risk_config.max_net_leverage = 2.0;

        let mut current = PositionBook::new();
        current.insert(Symbol::new("A"), 2500);
        current.insert(Symbol::new("B"), 2500);
        let bars = vec![];
        let marks = closes(&[("A", 100.0), ("B", 100.0)]);
        let mut risk_manager = RiskManager::new(cfg.risk_config.clone());

        let (positions, risk_result) = pc.apply_constraints(&current, &bars, &marks, &mut risk_manager, &cfg);
        let risk_result = risk_result.unwrap();
        assert!(risk_result.risk_exceeded);
        assert_eq!(positions[&Symbol::new("A")], (2500.0 * risk_result.recommended_scale).round() as i64);
    }

    #[test]
    fn risk_disabled_returns_positions_unchanged_with_no_result() {
        let mut pc = PortfolioConstraints::new(252, 20, 0.0001);
        let cfg = BacktestConfig::test_defaults(vec![Symbol::new("A")]);
        let mut current = PositionBook::new();
        current.insert(Symbol::new("A"), 7);
        let bars = vec![];
        let marks = closes(&[("A", 100.0)]);
        let mut risk_manager = RiskManager::new(RiskConfig::default());

        let (positions, risk_result) = pc.apply_constraints(&current, &bars, &marks, &mut risk_manager, &cfg);
        assert!(risk_result.is_none());
        assert_eq!(positions, current);
    }
}
