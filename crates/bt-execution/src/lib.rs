//! bt-execution
//!
//! Converts position deltas into fills and prices those fills under
//! whichever transaction cost model the run was constructed with. The cost
//! model is fixed once at construction and never switched mid run.

use std::collections::{BTreeMap, VecDeque};

use bt_types::{BacktestConfig, CostModel, Decimal, Fill, MarkMap, PositionBook, Side, Symbol};

/// Number of trailing days used for the rolling ADV/volatility estimate
/// under the new cost model. Not named anywhere in the source material;
/// a 20-day window is the conventional ADV horizon and is used here.
const ROLLING_WINDOW: usize = 20;

/// Rolling per-symbol volume and return history feeding the new cost
/// model's participation and volatility terms.
#[derive(Clone, Debug, Default)]
pub struct TransactionCostManager {
    volumes: BTreeMap<Symbol, VecDeque<i64>>,
    returns: BTreeMap<Symbol, VecDeque<f64>>,
}

impl TransactionCostManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_market_data(&mut self, symbol: &Symbol, volume: i64, close: f64, prev_close: f64) {
        let vols = self.volumes.entry(symbol.clone()).or_default();
        vols.push_back(volume);
        if vols.len() > ROLLING_WINDOW {
            vols.pop_front();
        }

        if prev_close > 0.0 {
            let r = (close - prev_close) / prev_close;
            if r.is_finite() {
                let rets = self.returns.entry(symbol.clone()).or_default();
                rets.push_back(r);
                if rets.len() > ROLLING_WINDOW {
                    rets.pop_front();
                }
            }
        }
    }

    /// Simple average of the rolling volume window. `0.0` with no history.
    pub fn get_adv(&self, symbol: &Symbol) -> f64 {
        match self.volumes.get(symbol) {
            Some(vols) if !vols.is_empty() => vols.iter().sum::<i64>() as f64 / vols.len() as f64,
            _ => 0.0,
        }
    }

    /// Sample standard deviation of the rolling return window. `0.0` with
    /// fewer than two observations.
    pub fn realized_volatility(&self, symbol: &Symbol) -> f64 {
        let Some(rets) = self.returns.get(symbol) else {
            return 0.0;
        };
        if rets.len() < 2 {
            return 0.0;
        }
        let mean = rets.iter().sum::<f64>() / rets.len() as f64;
        let variance = rets.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (rets.len() - 1) as f64;
        variance.max(0.0).sqrt()
    }

    pub fn reset(&mut self) {
        self.volumes.clear();
        self.returns.clear();
    }
}

/// Generates fills for a day's position deltas and prices them under the
/// configured cost model.
#[derive(Clone, Debug)]
pub struct ExecutionManager {
    cost_model: CostModel,
    commission_rate: Decimal,
    fixed_cost: Decimal,
    slippage_bps: i64,
    market_impact_bps: i64,
    per_contract_commission: Decimal,
    impact_coefficient: f64,
    volatility_coefficient: f64,
    cost_manager: TransactionCostManager,
    order_counter: u64,
    exec_counter: u64,
}

impl ExecutionManager {
    pub fn new(config: &BacktestConfig) -> Self {
        ExecutionManager {
            cost_model: config.cost_model,
            commission_rate: config.commission_rate,
            fixed_cost: config.fixed_cost,
            slippage_bps: config.slippage_bps,
            market_impact_bps: config.market_impact_bps,
            per_contract_commission: config.per_contract_commission,
            impact_coefficient: config.impact_coefficient,
            volatility_coefficient: config.volatility_coefficient,
            cost_manager: TransactionCostManager::new(),
            order_counter: 0,
            exec_counter: 0,
        }
    }

    pub fn update_market_data(&mut self, symbol: &Symbol, volume: i64, close: f64, prev_close: f64) {
        self.cost_manager.update_market_data(symbol, volume, close, prev_close);
    }

    pub fn get_adv(&self, symbol: &Symbol) -> f64 {
        self.cost_manager.get_adv(symbol)
    }

    pub fn reset(&mut self) {
        self.order_counter = 0;
        self.exec_counter = 0;
        self.cost_manager.reset();
    }

    fn generate_order_id(&mut self) -> String {
        self.order_counter += 1;
        format!("BT-{}", self.order_counter)
    }

    fn generate_exec_id(&mut self) -> String {
        self.exec_counter += 1;
        format!("EX-{}", self.exec_counter)
    }

    /// For every symbol in `new_positions`, computes `quantity_change =
    /// new_qty - current_qty` (current defaults to 0 when absent), skips
    /// zero-change and symbols with a missing/non-positive execution
    /// price (warn-logged), and generates a `Fill` for everything else.
    pub fn generate_executions(
        &mut self,
        current_positions: &PositionBook,
        new_positions: &PositionBook,
        execution_prices: &MarkMap,
        day_id: i64,
    ) -> Vec<Fill> {
        let mut fills = Vec::new();
        for (symbol, &new_qty) in new_positions {
            let current_qty = current_positions.get(symbol).copied().unwrap_or(0);
            let quantity_change = new_qty - current_qty;
            if quantity_change == 0 {
                continue;
            }

            let Some(&price) = execution_prices.get(symbol) else {
                tracing::warn!(%symbol, "no execution price available, skipping fill");
                continue;
            };
            if price.to_f64() <= 0.0 {
                tracing::warn!(%symbol, "non-positive execution price, skipping fill");
                continue;
            }

            fills.push(self.generate_execution(symbol.clone(), quantity_change, price, day_id));
        }
        fills
    }

    pub fn generate_execution(&mut self, symbol: Symbol, quantity_change: i64, execution_price: Decimal, day_id: i64) -> Fill {
        let side = if quantity_change > 0 { Side::Buy } else { Side::Sell };
        let abs_quantity = quantity_change.unsigned_abs() as f64;
        let ref_price = execution_price.to_f64();

        let (fill_price, commissions_fees, implicit_price_impact, slippage_market_impact, total_transaction_costs) =
            match self.cost_model {
                CostModel::New => {
                    let commissions_fees = abs_quantity * self.per_contract_commission.to_f64();
                    let adv = self.cost_manager.get_adv(&symbol).max(1.0);
                    let participation = abs_quantity / adv;
                    let implicit_price_impact = ref_price * participation * self.impact_coefficient;
                    let realized_volatility = self.cost_manager.realized_volatility(&symbol);
                    let slippage_market_impact =
                        ref_price * realized_volatility * self.volatility_coefficient * abs_quantity.sqrt();
                    let total = commissions_fees + implicit_price_impact + slippage_market_impact;
                    (
                        execution_price,
                        Decimal::from_f64(commissions_fees),
                        Decimal::from_f64(implicit_price_impact),
                        Decimal::from_f64(slippage_market_impact),
                        Decimal::from_f64(total),
                    )
                }
                CostModel::Legacy => {
                    let side_sign = if quantity_change > 0 { 1.0 } else { -1.0 };
                    let fill_price_f64 = ref_price * (1.0 + side_sign * self.slippage_bps as f64 / 10_000.0);
                    let commissions_fees = abs_quantity * self.commission_rate.to_f64() + self.fixed_cost.to_f64();
                    let slippage_market_impact = abs_quantity * ref_price * self.market_impact_bps as f64 / 10_000.0;
                    let total = commissions_fees + slippage_market_impact;
                    (
                        Decimal::from_f64(fill_price_f64),
                        Decimal::from_f64(commissions_fees),
                        Decimal::ZERO,
                        Decimal::from_f64(slippage_market_impact),
                        Decimal::from_f64(total),
                    )
                }
            };

        Fill {
            symbol,
            side,
            quantity: quantity_change.abs(),
            fill_price,
            commissions_fees,
            implicit_price_impact,
            slippage_market_impact,
            total_transaction_costs,
            order_id: self.generate_order_id(),
            exec_id: self.generate_exec_id(),
            day_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_config() -> BacktestConfig {
        let mut cfg = BacktestConfig::test_defaults(vec![Symbol::new("ES")]);
        cfg.cost_model = CostModel::Legacy;
        cfg.commission_rate = Decimal::from_f64(0.001);
        cfg.fixed_cost = Decimal::from_f64(1.0);
        cfg.slippage_bps = 10;
        cfg.market_impact_bps = 5;
        cfg
    }

    #[test]
    fn scenario_s6_legacy_cost_model_embeds_slippage_in_fill_price() {
        // BUY 10 @ ref 50.0, slippage_bps=10, market_impact_bps=5, commission_rate=0.001, fixed_cost=1.0.
        let mut mgr = ExecutionManager::new(&legacy_config());
        let fill = mgr.generate_execution(Symbol::new("ES"), 10, Decimal::from_f64(50.0), 1);

        assert!((fill.fill_price.to_f64() - 50.05).abs() < 1e-9);
        assert!((fill.commissions_fees.to_f64() - 1.01).abs() < 1e-9);
        assert!((fill.slippage_market_impact.to_f64() - 0.25).abs() < 1e-9);
        assert!((fill.total_transaction_costs.to_f64() - 1.26).abs() < 1e-9);
        assert_eq!(fill.implicit_price_impact, Decimal::ZERO);
    }

    #[test]
    fn legacy_sell_applies_negative_side_sign() {
        let mut mgr = ExecutionManager::new(&legacy_config());
        let fill = mgr.generate_execution(Symbol::new("ES"), -10, Decimal::from_f64(50.0), 1);
        assert_eq!(fill.side, Side::Sell);
        assert!(fill.fill_price.to_f64() < 50.0);
    }

    #[test]
    fn order_and_exec_ids_are_monotonic_with_prefixes() {
        let mut mgr = ExecutionManager::new(&legacy_config());
        let a = mgr.generate_execution(Symbol::new("ES"), 1, Decimal::from_f64(50.0), 1);
        let b = mgr.generate_execution(Symbol::new("ES"), 1, Decimal::from_f64(50.0), 1);
        assert_eq!(a.order_id, "BT-1");
        assert_eq!(b.order_id, "BT-2");
        assert_eq!(a.exec_id, "EX-1");
        assert_eq!(b.exec_id, "EX-2");
    }

    #[test]
    fn generate_executions_skips_zero_delta_and_missing_price() {
        let mut mgr = ExecutionManager::new(&legacy_config());
        let mut current = PositionBook::new();
        current.insert(Symbol::new("ES"), 5);
        let mut new_positions = PositionBook::new();
        new_positions.insert(Symbol::new("ES"), 5); // unchanged
        new_positions.insert(Symbol::new("NQ"), 2); // no price

        let prices = MarkMap::new();
        let fills = mgr.generate_executions(&current, &new_positions, &prices, 1);
        assert!(fills.is_empty());
    }

    #[test]
    fn generate_executions_produces_one_fill_per_changed_symbol() {
        let mut mgr = ExecutionManager::new(&legacy_config());
        let current = PositionBook::new();
        let mut new_positions = PositionBook::new();
        new_positions.insert(Symbol::new("ES"), 3);
        let mut prices = MarkMap::new();
        prices.insert(Symbol::new("ES"), Decimal::from_f64(100.0));

        let fills = mgr.generate_executions(&current, &new_positions, &prices, 7);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].quantity, 3);
        assert_eq!(fills[0].day_id, 7);
    }

    #[test]
    fn new_cost_model_uses_pure_reference_price() {
        let mut cfg = BacktestConfig::test_defaults(vec![Symbol::new("ES")]);
        cfg.cost_model = CostModel::New;
        cfg.per_contract_commission = Decimal::from_f64(2.5);
        cfg.impact_coefficient = 0.1;
        cfg.volatility_coefficient = 0.05;
        let mut mgr = ExecutionManager::new(&cfg);

        let fill = mgr.generate_execution(Symbol::new("ES"), 4, Decimal::from_f64(100.0), 1);
        assert_eq!(fill.fill_price, Decimal::from_f64(100.0));
        assert_eq!(fill.commissions_fees, Decimal::from_f64(10.0));
    }

    #[test]
    fn adv_participation_shrinks_impact_as_history_accumulates() {
        let mut cfg = BacktestConfig::test_defaults(vec![Symbol::new("ES")]);
        cfg.cost_model = CostModel::New;
        cfg.impact_coefficient = 1.0;
        let mut mgr = ExecutionManager::new(&cfg);
        let symbol = Symbol::new("ES");

        let thin_history_fill = mgr.generate_execution(symbol.clone(), 10, Decimal::from_f64(100.0), 1);

        for _ in 0..20 {
            mgr.update_market_data(&symbol, 10_000, 100.0, 100.0);
        }
        let deep_history_fill = mgr.generate_execution(symbol, 10, Decimal::from_f64(100.0), 2);

        assert!(deep_history_fill.implicit_price_impact.to_f64() < thin_history_fill.implicit_price_impact.to_f64());
    }

    #[test]
    fn reset_clears_counters_and_rolling_state() {
        let mut mgr = ExecutionManager::new(&legacy_config());
        let symbol = Symbol::new("ES");
        mgr.generate_execution(symbol.clone(), 1, Decimal::from_f64(50.0), 1);
        mgr.update_market_data(&symbol, 100, 50.0, 49.0);
        mgr.reset();

        let fill = mgr.generate_execution(symbol.clone(), 1, Decimal::from_f64(50.0), 1);
        assert_eq!(fill.order_id, "BT-1");
        assert_eq!(mgr.get_adv(&symbol), 0.0);
    }
}
