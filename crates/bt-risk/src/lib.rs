//! bt-risk
//!
//! Four independent risk multipliers — portfolio VaR, jump risk,
//! correlation risk, leverage — collapsed into one `recommended_scale`.
//! The risk manager never raises a fatal error on its own account: it only
//! ever reports a `RiskResult`. Enforcement (scaling positions down, or
//! promoting a breach to a hard stop) belongs to `bt-portfolio` and its
//! caller respectively.

use std::collections::BTreeMap;

use bt_types::{Bar, MarkMap, PositionBook, RiskConfig, RiskResult, Symbol};

/// Tracks rolling per-symbol close-price and return history used to
/// estimate the historical tails the four multipliers compare today's risk
/// against.
#[derive(Clone, Debug, Default)]
pub struct RiskManager {
    config: RiskConfig,
    price_history: BTreeMap<Symbol, Vec<f64>>,
    return_history: BTreeMap<Symbol, Vec<f64>>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        RiskManager {
            config,
            price_history: BTreeMap::new(),
            return_history: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RiskConfig) {
        self.config = config;
    }

    /// Appends today's closes to each symbol's rolling price history and
    /// recomputes simple relative returns, dropping non-finite results
    /// (zero/negative previous close). History is truncated to
    /// `lookback_period + 1` closes (enough to produce `lookback_period`
    /// returns).
    pub fn update_market_data(&mut self, bars: &[Bar]) {
        let cap = self.config.lookback_period + 1;
        for bar in bars {
            if !bar.is_complete {
                continue;
            }
            let prices = self.price_history.entry(bar.symbol.clone()).or_default();
            prices.push(bar.close.to_f64());
            if prices.len() > cap {
                let excess = prices.len() - cap;
                prices.drain(0..excess);
            }

            let returns: Vec<f64> = prices
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
            self.return_history.insert(bar.symbol.clone(), returns);
        }
    }

    fn notional_weights(&self, positions: &PositionBook, marks: &MarkMap) -> BTreeMap<Symbol, f64> {
        let mut notionals = BTreeMap::new();
        let mut total = 0.0;
        for (symbol, &qty) in positions {
            if qty == 0 {
                continue;
            }
            let Some(&price) = marks.get(symbol) else {
                continue;
            };
            let notional = (qty as f64 * price.to_f64()).abs();
            notionals.insert(symbol.clone(), notional);
            total += notional;
        }
        let mut weights = BTreeMap::new();
        if total > 0.0 {
            for (symbol, notional) in notionals {
                weights.insert(symbol, notional / total);
            }
        }
        weights
    }

    /// Historical 99th-percentile tail: sort `series` ascending, pick
    /// `index = floor((1 - confidence_level) * n)` counted from the top.
    fn percentile_from_top(series: &[f64], confidence_level: f64) -> f64 {
        if series.is_empty() {
            return 0.0;
        }
        let mut sorted = series.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = sorted.len();
        let index = (((1.0 - confidence_level) * n as f64).floor() as usize).min(n - 1);
        sorted[n - 1 - index]
    }

    fn multiplier_from(max_risk: f64, current_risk: f64) -> f64 {
        if current_risk <= 0.0 {
            1.0
        } else {
            (max_risk / current_risk).min(1.0)
        }
    }

    /// Computes the four multipliers and the overall recommendation.
    /// `marks` supplies current prices, used both for notional weights and
    /// (in place of a carried average price — this simplified `Position`
    /// model has no `average_price` field) leverage notionals.
    pub fn process_positions(&self, positions: &PositionBook, marks: &MarkMap) -> RiskResult {
        let weights = self.notional_weights(positions, marks);
        let sqrt_252 = 252f64.sqrt();

        // --- Portfolio VaR proxy ---
        let mut portfolio_series = Vec::new();
        let common_len = weights
            .keys()
            .filter_map(|s| self.return_history.get(s).map(|r| r.len()))
            .min()
            .unwrap_or(0);
        for t in 0..common_len {
            let mut day_value = 0.0;
            for (symbol, &w) in &weights {
                if let Some(returns) = self.return_history.get(symbol) {
                    let offset = returns.len() - common_len;
                    day_value += w * returns[offset + t];
                }
            }
            portfolio_series.push(day_value.abs() * sqrt_252);
        }
        let current_portfolio_risk = portfolio_series.last().copied().unwrap_or(0.0);
        let max_portfolio_risk = Self::percentile_from_top(&portfolio_series, self.config.confidence_level);
        let portfolio_multiplier = Self::multiplier_from(max_portfolio_risk, current_portfolio_risk);

        // --- Correlation/concentration proxy ---
        let mut correlation_series = Vec::new();
        for t in 0..common_len {
            let mut day_value = 0.0;
            for (symbol, &w) in &weights {
                if let Some(returns) = self.return_history.get(symbol) {
                    let offset = returns.len() - common_len;
                    day_value += (w * returns[offset + t]).abs();
                }
            }
            correlation_series.push(day_value * sqrt_252);
        }
        let current_correlation_risk = correlation_series.last().copied().unwrap_or(0.0);
        let max_correlation_risk = Self::percentile_from_top(&correlation_series, self.config.confidence_level);
        let correlation_multiplier = Self::multiplier_from(max_correlation_risk, current_correlation_risk);

        // --- Jump risk ---
        // Each asset's own 99th-percentile absolute return (annualized) is
        // its historical jump size; today's weighted sum of those is the
        // "current" exposure. The historical comparator reuses the
        // correlation day series (same shape: today's weights applied to
        // each day's actual |return|), documented in DESIGN.md.
        let mut current_jump_risk = 0.0;
        for (symbol, &w) in &weights {
            if let Some(returns) = self.return_history.get(symbol) {
                let abs_returns: Vec<f64> = returns.iter().map(|r| r.abs()).collect();
                let asset_jump = Self::percentile_from_top(&abs_returns, self.config.confidence_level) * sqrt_252;
                current_jump_risk += w * asset_jump;
            }
        }
        let max_jump_risk = max_correlation_risk;
        let jump_multiplier = Self::multiplier_from(max_jump_risk, current_jump_risk);

        // --- Leverage ---
        let (leverage_multiplier, gross_leverage, _net_leverage, max_leverage) = if self.config.capital <= 0.0 {
            tracing::warn!("non-positive capital, leverage multiplier forced to 0");
            (0.0, 0.0, 0.0, self.config.max_gross_leverage)
        } else {
            let mut gross = 0.0;
            let mut net = 0.0;
            for (symbol, &qty) in positions {
                if qty == 0 {
                    continue;
                }
                let Some(&price) = marks.get(symbol) else {
                    continue;
                };
                let notional = qty as f64 * price.to_f64();
                gross += notional.abs();
                net += notional;
            }
            gross /= self.config.capital;
            net = net.abs() / self.config.capital;

            let gross_ratio = if gross == 0.0 { 1.0 } else { self.config.max_gross_leverage / gross };
            let net_ratio = if net == 0.0 { 1.0 } else { self.config.max_net_leverage / net };
            let multiplier = gross_ratio.min(net_ratio).min(1.0).max(0.0);
            (multiplier, gross, net, self.config.max_gross_leverage)
        };

        let recommended_scale = portfolio_multiplier
            .min(jump_multiplier)
            .min(correlation_multiplier)
            .min(leverage_multiplier);

        // net_leverage is intentionally not carried in `RiskResult` — the
        // struct exposes one `leverage_risk`/`max_leverage` pair (gross);
        // net leverage still constrains `leverage_multiplier` above even
        // though it isn't surfaced here.
        RiskResult {
            risk_exceeded: recommended_scale < 1.0,
            recommended_scale,
            portfolio_risk: current_portfolio_risk,
            jump_risk: current_jump_risk,
            correlation_risk: current_correlation_risk,
            leverage_risk: gross_leverage,
            portfolio_multiplier,
            jump_multiplier,
            correlation_multiplier,
            leverage_multiplier,
            max_portfolio_risk,
            max_jump_risk,
            max_correlation_risk,
            max_leverage,
        }
    }
}
