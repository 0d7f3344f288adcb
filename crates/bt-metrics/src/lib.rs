//! bt-metrics
//!
//! Stateless performance and trade statistics. Every method takes its
//! inputs by reference and returns a value; the `MetricsCalculator`
//! instance only ever holds calculation parameters (`trading_days_per_year`,
//! `risk_free_rate`), never run state.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use bt_types::{BacktestResults, Decimal, Fill, Side, Symbol};

#[derive(Clone, Debug, PartialEq)]
pub struct MetricsCalculator {
    pub trading_days_per_year: f64,
    pub risk_free_rate: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        MetricsCalculator {
            trading_days_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TradeStatistics {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_profit: Decimal,
    pub total_loss: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub max_win: Decimal,
    pub max_loss: Decimal,
    pub avg_holding_period: f64,
}

struct ClosedTrade {
    symbol: Symbol,
    pnl: Decimal,
    holding_period: i64,
}

struct OpenLot {
    quantity: i64, // signed: +long, -short
    price: Decimal,
    day_id: i64,
}

/// Replays `fills` through a per-symbol FIFO lot ledger. A trade closes
/// whenever an opposite-side fill fully or partially consumes an open lot.
fn replay_fifo(fills: &[Fill]) -> (Vec<ClosedTrade>, BTreeMap<Symbol, Decimal>) {
    let mut sorted: Vec<&Fill> = fills.iter().collect();
    sorted.sort_by_key(|f| f.day_id);

    let mut open_lots: BTreeMap<Symbol, Vec<OpenLot>> = BTreeMap::new();
    let mut symbol_pnl: BTreeMap<Symbol, Decimal> = BTreeMap::new();
    let mut trades = Vec::new();

    for fill in sorted {
        let mut signed_qty = match fill.side {
            Side::Buy => fill.quantity,
            Side::Sell => -fill.quantity,
        };

        let lots = open_lots.entry(fill.symbol.clone()).or_default();

        while signed_qty != 0 {
            let Some(front) = lots.first_mut() else { break };
            let same_sign = (front.quantity > 0) == (signed_qty > 0);
            if same_sign {
                break;
            }

            let match_qty = signed_qty.abs().min(front.quantity.abs());
            let pnl_per_unit = if front.quantity > 0 {
                fill.fill_price.to_f64() - front.price.to_f64()
            } else {
                front.price.to_f64() - fill.fill_price.to_f64()
            };
            let pnl = Decimal::from_f64(pnl_per_unit * match_qty as f64);

            trades.push(ClosedTrade {
                symbol: fill.symbol.clone(),
                pnl,
                holding_period: fill.day_id - front.day_id,
            });
            *symbol_pnl.entry(fill.symbol.clone()).or_insert(Decimal::ZERO) += pnl;

            if front.quantity > 0 {
                front.quantity -= match_qty;
                signed_qty += match_qty;
            } else {
                front.quantity += match_qty;
                signed_qty -= match_qty;
            }
            if front.quantity == 0 {
                lots.remove(0);
            }
        }

        if signed_qty != 0 {
            lots.push(OpenLot {
                quantity: signed_qty,
                price: fill.fill_price,
                day_id: fill.day_id,
            });
        }
    }

    (trades, symbol_pnl)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.max(0.0).sqrt()
}

impl MetricsCalculator {
    pub fn total_return(&self, start_equity: f64, end_equity: f64) -> f64 {
        if start_equity == 0.0 {
            0.0
        } else {
            (end_equity - start_equity) / start_equity
        }
    }

    pub fn returns_from_equity(&self, equity_curve: &[(i64, Decimal)]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .filter_map(|w| {
                let prev = w[0].1.to_f64();
                let cur = w[1].1.to_f64();
                if prev != 0.0 {
                    let r = (cur - prev) / prev;
                    if r.is_finite() {
                        return Some(r);
                    }
                }
                None
            })
            .collect()
    }

    pub fn annualized_volatility(&self, returns: &[f64]) -> f64 {
        stdev(returns) * self.trading_days_per_year.sqrt()
    }

    pub fn sharpe_ratio(&self, returns: &[f64], risk_free_rate: f64) -> f64 {
        let sd = stdev(returns);
        if sd == 0.0 {
            return 0.0;
        }
        let td = self.trading_days_per_year;
        (mean(returns) - risk_free_rate / td) / sd * td.sqrt()
    }

    pub fn downside_volatility(&self, returns: &[f64], target: f64) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let mean_sq = returns.iter().map(|r| (r - target).min(0.0).powi(2)).sum::<f64>() / returns.len() as f64;
        mean_sq.sqrt() * self.trading_days_per_year.sqrt()
    }

    pub fn sortino_ratio(&self, returns: &[f64], minimum_acceptable_return: f64) -> f64 {
        let td = self.trading_days_per_year;
        let period_mar = minimum_acceptable_return / td;
        let numerator = (mean(returns) - period_mar) * td.sqrt();
        let denom = self.downside_volatility(returns, period_mar);
        if denom == 0.0 {
            if numerator >= 0.0 {
                999.0
            } else {
                0.0
            }
        } else {
            numerator / denom
        }
    }

    pub fn drawdowns(&self, equity_curve: &[(i64, Decimal)]) -> Vec<(i64, f64)> {
        let mut peak = f64::MIN;
        let mut out = Vec::with_capacity(equity_curve.len());
        for &(day_id, value) in equity_curve {
            let v = value.to_f64();
            peak = peak.max(v);
            let dd = if peak > 0.0 { (peak - v) / peak } else { 0.0 };
            out.push((day_id, dd));
        }
        out
    }

    pub fn max_drawdown(&self, equity_curve: &[(i64, Decimal)]) -> f64 {
        self.drawdowns(equity_curve).into_iter().map(|(_, dd)| dd).fold(0.0, f64::max)
    }

    pub fn calmar_ratio(&self, total_return: f64, max_drawdown: f64) -> f64 {
        if max_drawdown == 0.0 {
            if total_return >= 0.0 {
                999.0
            } else {
                0.0
            }
        } else {
            total_return / max_drawdown
        }
    }

    /// Positive loss magnitude: `-sorted(r)[floor(0.05 * n)]`.
    pub fn var_95(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let index = ((0.05 * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
        -sorted[index]
    }

    /// Positive loss magnitude: mean of the worst tail, negated.
    pub fn cvar_95(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let k = ((0.05 * sorted.len() as f64).floor() as usize).max(1).min(sorted.len());
        -(sorted[..k].iter().sum::<f64>() / k as f64)
    }

    pub fn trade_statistics(&self, fills: &[Fill]) -> TradeStatistics {
        let (trades, _) = replay_fifo(fills);
        if trades.is_empty() {
            return TradeStatistics::default();
        }

        let mut winning_trades = 0u64;
        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;
        let mut max_win = Decimal::ZERO;
        let mut max_loss = Decimal::ZERO;
        let mut total_holding = 0i64;

        for trade in &trades {
            total_holding += trade.holding_period;
            if trade.pnl.to_f64() > 0.0 {
                winning_trades += 1;
                total_profit += trade.pnl;
                if trade.pnl.to_f64() > max_win.to_f64() {
                    max_win = trade.pnl;
                }
            } else if trade.pnl.to_f64() < 0.0 {
                let loss = Decimal::from_f64(-trade.pnl.to_f64());
                total_loss += loss;
                if loss.to_f64() > max_loss.to_f64() {
                    max_loss = loss;
                }
            }
        }

        let total_trades = trades.len() as u64;
        let losing_trades = total_trades - winning_trades;
        let win_rate = winning_trades as f64 / total_trades as f64;
        let profit_factor = if total_loss.to_f64() == 0.0 {
            if total_profit.to_f64() > 0.0 { 999.0 } else { 0.0 }
        } else {
            total_profit.to_f64() / total_loss.to_f64()
        };
        let avg_win = if winning_trades > 0 {
            Decimal::from_f64(total_profit.to_f64() / winning_trades as f64)
        } else {
            Decimal::ZERO
        };
        let avg_loss = if losing_trades > 0 {
            Decimal::from_f64(total_loss.to_f64() / losing_trades as f64)
        } else {
            Decimal::ZERO
        };

        TradeStatistics {
            total_trades,
            winning_trades,
            win_rate,
            profit_factor,
            total_profit,
            total_loss,
            avg_win,
            avg_loss,
            max_win,
            max_loss,
            avg_holding_period: total_holding as f64 / total_trades as f64,
        }
    }

    pub fn symbol_pnl(&self, fills: &[Fill]) -> BTreeMap<Symbol, Decimal> {
        replay_fifo(fills).1
    }

    pub fn monthly_returns(&self, equity_curve: &[(i64, Decimal)]) -> BTreeMap<String, f64> {
        let mut by_month: BTreeMap<String, (f64, f64)> = BTreeMap::new(); // key -> (first, last)
        for &(day_id, value) in equity_curve {
            let Some(date) = NaiveDate::from_num_days_from_ce_opt(day_id as i32) else {
                continue;
            };
            let key = date.format("%Y-%m").to_string();
            let v = value.to_f64();
            by_month
                .entry(key)
                .and_modify(|(_, last)| *last = v)
                .or_insert((v, v));
        }
        by_month
            .into_iter()
            .map(|(key, (first, last))| (key, self.total_return(first, last)))
            .collect()
    }

    /// Degenerate self-correlation placeholder: beta and correlation
    /// against the strategy's own return series, used when no external
    /// benchmark is supplied. See [`Self::beta_correlation_vs`] for the
    /// benchmark-aware seam.
    pub fn beta_correlation(&self, returns: &[f64]) -> (f64, f64) {
        if returns.is_empty() {
            (0.0, 0.0)
        } else {
            (1.0, 1.0)
        }
    }

    pub fn beta_correlation_vs(&self, returns: &[f64], benchmark_returns: &[f64]) -> (f64, f64) {
        let n = returns.len().min(benchmark_returns.len());
        if n < 2 {
            return (0.0, 0.0);
        }
        let r = &returns[returns.len() - n..];
        let b = &benchmark_returns[benchmark_returns.len() - n..];
        let mean_r = mean(r);
        let mean_b = mean(b);

        let mut cov = 0.0;
        let mut var_b = 0.0;
        let mut var_r = 0.0;
        for i in 0..n {
            let dr = r[i] - mean_r;
            let db = b[i] - mean_b;
            cov += dr * db;
            var_b += db * db;
            var_r += dr * dr;
        }

        let beta = if var_b == 0.0 { 0.0 } else { cov / var_b };
        let correlation = if var_b == 0.0 || var_r == 0.0 { 0.0 } else { cov / (var_r.sqrt() * var_b.sqrt()) };
        (beta, correlation)
    }

    /// Composite entry point: the first `warmup_days` equity points are
    /// excluded from every metric calculated here, but remain present in
    /// the returned `equity_curve`.
    pub fn calculate_all_metrics(
        &self,
        equity_curve: &[(i64, Decimal)],
        fills: &[Fill],
        warmup_days: usize,
    ) -> BacktestResults {
        let windowed: Vec<(i64, Decimal)> = if warmup_days < equity_curve.len() {
            equity_curve[warmup_days..].to_vec()
        } else {
            Vec::new()
        };

        let returns = self.returns_from_equity(&windowed);
        let start_equity = windowed.first().map(|(_, v)| v.to_f64()).unwrap_or(0.0);
        let end_equity = windowed.last().map(|(_, v)| v.to_f64()).unwrap_or(0.0);
        let total_return = self.total_return(start_equity, end_equity);
        let max_drawdown = self.max_drawdown(&windowed);
        let (beta, correlation) = self.beta_correlation(&returns);
        let trade_stats = self.trade_statistics(fills);

        BacktestResults {
            total_return,
            sharpe_ratio: self.sharpe_ratio(&returns, self.risk_free_rate),
            sortino_ratio: self.sortino_ratio(&returns, self.risk_free_rate),
            max_drawdown,
            calmar_ratio: self.calmar_ratio(total_return, max_drawdown),
            volatility: self.annualized_volatility(&returns),
            total_trades: trade_stats.total_trades,
            win_rate: trade_stats.win_rate,
            profit_factor: trade_stats.profit_factor,
            avg_win: trade_stats.avg_win.to_f64(),
            avg_loss: trade_stats.avg_loss.to_f64(),
            max_win: trade_stats.max_win.to_f64(),
            max_loss: trade_stats.max_loss.to_f64(),
            avg_holding_period: trade_stats.avg_holding_period,
            var_95: self.var_95(&returns),
            cvar_95: self.cvar_95(&returns),
            beta,
            correlation,
            downside_volatility: self.downside_volatility(&returns, 0.0),
            executions: fills.to_vec(),
            positions: Vec::new(),
            equity_curve: equity_curve.to_vec(),
            drawdown_curve: self.drawdowns(&windowed),
            monthly_returns: self.monthly_returns(&windowed),
            symbol_pnl: self.symbol_pnl(fills),
            risk_metrics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(symbol: &str, side: Side, qty: i64, price: f64, day_id: i64) -> Fill {
        Fill {
            symbol: Symbol::new(symbol),
            side,
            quantity: qty,
            fill_price: Decimal::from_f64(price),
            commissions_fees: Decimal::ZERO,
            implicit_price_impact: Decimal::ZERO,
            slippage_market_impact: Decimal::ZERO,
            total_transaction_costs: Decimal::ZERO,
            order_id: format!("BT-{day_id}"),
            exec_id: format!("EX-{day_id}"),
            day_id,
        }
    }

    #[test]
    fn fifo_replay_computes_realized_pnl_on_full_close() {
        let calc = MetricsCalculator::default();
        let fills = vec![
            fill("ES", Side::Buy, 10, 100.0, 1),
            fill("ES", Side::Sell, 10, 110.0, 5),
        ];
        let stats = calc.trade_statistics(&fills);
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.avg_holding_period, 4.0);
        assert_eq!(stats.total_profit, Decimal::from_f64(100.0));
    }

    #[test]
    fn fifo_replay_handles_partial_close_and_reversal() {
        let calc = MetricsCalculator::default();
        let fills = vec![
            fill("ES", Side::Buy, 10, 100.0, 1),
            fill("ES", Side::Sell, 15, 105.0, 2), // closes 10 long, opens 5 short
        ];
        let pnl = calc.symbol_pnl(&fills);
        assert_eq!(pnl[&Symbol::new("ES")], Decimal::from_f64(50.0));
    }

    #[test]
    fn total_return_handles_zero_start() {
        let calc = MetricsCalculator::default();
        assert_eq!(calc.total_return(0.0, 100.0), 0.0);
    }

    #[test]
    fn max_drawdown_tracks_running_peak() {
        let calc = MetricsCalculator::default();
        let curve = vec![
            (1, Decimal::from_f64(100.0)),
            (2, Decimal::from_f64(120.0)),
            (3, Decimal::from_f64(90.0)),
            (4, Decimal::from_f64(110.0)),
        ];
        let dd = calc.max_drawdown(&curve);
        assert!((dd - 0.25).abs() < 1e-9);
    }

    #[test]
    fn calmar_ratio_caps_at_999_with_no_drawdown() {
        let calc = MetricsCalculator::default();
        assert_eq!(calc.calmar_ratio(0.1, 0.0), 999.0);
        assert_eq!(calc.calmar_ratio(-0.1, 0.0), 0.0);
    }

    #[test]
    fn var_and_cvar_use_worst_tail() {
        let calc = MetricsCalculator::default();
        let returns = vec![-0.05, -0.04, -0.01, 0.0, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06];
        let var = calc.var_95(&returns);
        let cvar = calc.cvar_95(&returns);
        assert_eq!(var, 0.05);
        assert_eq!(cvar, 0.05);
    }

    #[test]
    fn scenario_s4_warmup_days_excluded_from_metrics_but_kept_in_curve() {
        let calc = MetricsCalculator::default();
        let mut curve = vec![(0, Decimal::from_f64(100.0)); 5];
        for (i, entry) in curve.iter_mut().enumerate() {
            entry.0 = i as i64;
        }
        curve.push((5, Decimal::from_f64(150.0)));
        curve.push((6, Decimal::from_f64(90.0)));

        let results = calc.calculate_all_metrics(&curve, &[], 5);
        assert_eq!(results.equity_curve.len(), 7);
        assert!(results.total_return != 0.0);
    }

    #[test]
    fn beta_correlation_placeholder_is_self_correlated() {
        let calc = MetricsCalculator::default();
        assert_eq!(calc.beta_correlation(&[0.01, 0.02]), (1.0, 1.0));
        assert_eq!(calc.beta_correlation(&[]), (0.0, 0.0));
    }

    #[test]
    fn monthly_returns_groups_by_calendar_month() {
        let calc = MetricsCalculator::default();
        // day 738000-ish range maps into the same or adjacent months; just
        // check grouping produces at least one bucket.
        let curve = vec![
            (738000, Decimal::from_f64(100.0)),
            (738010, Decimal::from_f64(105.0)),
            (738040, Decimal::from_f64(110.0)),
        ];
        let monthly = calc.monthly_returns(&curve);
        assert!(!monthly.is_empty());
    }
}
