//! bt-pnl
//!
//! Beginning-of-day mark-to-market P&L: `daily_pnl = quantity *
//! (current_close - previous_close) * point_value`. Stateful only in the
//! sense that it remembers yesterday's closes between calls — no IO, no
//! wall-clock reads.

use std::collections::BTreeMap;

use bt_types::{
    DailyPnlResult, Decimal, InstrumentRegistry, MarkMap, PositionBook, PositionPnlResult, Symbol,
};

pub struct PnLManager {
    previous_close_prices: BTreeMap<Symbol, Decimal>,
    position_daily_pnl: BTreeMap<Symbol, Decimal>,
    position_cumulative_pnl: BTreeMap<Symbol, Decimal>,
    daily_total_pnl: Decimal,
    cumulative_total_pnl: Decimal,
    current_portfolio_value: Decimal,
    current_date: Option<String>,
}

impl PnLManager {
    pub fn new(initial_portfolio_value: Decimal) -> Self {
        PnLManager {
            previous_close_prices: BTreeMap::new(),
            position_daily_pnl: BTreeMap::new(),
            position_cumulative_pnl: BTreeMap::new(),
            daily_total_pnl: Decimal::ZERO,
            cumulative_total_pnl: Decimal::ZERO,
            current_portfolio_value: initial_portfolio_value,
            current_date: None,
        }
    }

    /// Prices a single symbol's day. `point_value` missing, no seeded
    /// previous close, or a negative/non-finite `current_close` each
    /// produce an invalid result with `error_message` set rather than
    /// propagating an error — one bad symbol must not abort the whole day.
    pub fn calculate_position_pnl(
        &self,
        registry: &dyn InstrumentRegistry,
        symbol: &Symbol,
        quantity: i64,
        current_close: Decimal,
    ) -> PositionPnlResult {
        if current_close.is_negative() || !current_close.to_f64().is_finite() {
            tracing::warn!(symbol = %symbol, "negative or non-finite close price, skipping position");
            return PositionPnlResult {
                symbol: symbol.clone(),
                quantity,
                previous_close: Decimal::ZERO,
                current_close,
                point_value: 0.0,
                daily_pnl: Decimal::ZERO,
                valid: false,
                error_message: Some(format!("negative or non-finite close price for {symbol}")),
            };
        }

        let previous_close = match self.previous_close_prices.get(symbol) {
            Some(&pc) => pc,
            None => {
                return PositionPnlResult {
                    symbol: symbol.clone(),
                    quantity,
                    previous_close: Decimal::ZERO,
                    current_close,
                    point_value: 0.0,
                    daily_pnl: Decimal::ZERO,
                    valid: false,
                    error_message: Some(format!("no previous close seeded for {symbol}")),
                };
            }
        };

        let point_value = match registry.point_value(symbol) {
            Some(pv) => pv,
            None => {
                tracing::warn!(symbol = %symbol, "no point value available, skipping position");
                return PositionPnlResult {
                    symbol: symbol.clone(),
                    quantity,
                    previous_close,
                    current_close,
                    point_value: 0.0,
                    daily_pnl: Decimal::ZERO,
                    valid: false,
                    error_message: Some(format!("no point value available for {symbol}")),
                };
            }
        };

        let daily_pnl_f64 =
            quantity as f64 * (current_close.to_f64() - previous_close.to_f64()) * point_value;

        PositionPnlResult {
            symbol: symbol.clone(),
            quantity,
            previous_close,
            current_close,
            point_value,
            daily_pnl: Decimal::from_f64(daily_pnl_f64),
            valid: true,
            error_message: None,
        }
    }

    /// Prices the whole book for one day. Invalid positions are excluded
    /// from the totals but still present in `position_results` for
    /// diagnostics.
    pub fn calculate_daily_pnl(
        &mut self,
        registry: &dyn InstrumentRegistry,
        date: &str,
        positions: &PositionBook,
        current_close_prices: &MarkMap,
        commissions: Decimal,
    ) -> DailyPnlResult {
        let mut total_daily_pnl = Decimal::ZERO;
        let mut position_results = BTreeMap::new();

        for (symbol, &quantity) in positions {
            if quantity == 0 {
                continue;
            }
            let current_close = match current_close_prices.get(symbol) {
                Some(&px) => px,
                None => {
                    tracing::warn!(symbol = %symbol, "no current close price, skipping position");
                    let result = PositionPnlResult {
                        symbol: symbol.clone(),
                        quantity,
                        previous_close: Decimal::ZERO,
                        current_close: Decimal::ZERO,
                        point_value: 0.0,
                        daily_pnl: Decimal::ZERO,
                        valid: false,
                        error_message: Some(format!("no current close price for {symbol}")),
                    };
                    position_results.insert(symbol.clone(), result);
                    continue;
                }
            };

            let result = self.calculate_position_pnl(registry, symbol, quantity, current_close);
            if result.valid {
                total_daily_pnl += result.daily_pnl;
                *self
                    .position_daily_pnl
                    .entry(symbol.clone())
                    .or_insert(Decimal::ZERO) = result.daily_pnl;
                *self
                    .position_cumulative_pnl
                    .entry(symbol.clone())
                    .or_insert(Decimal::ZERO) += result.daily_pnl;
            }
            position_results.insert(symbol.clone(), result);
        }

        let net_daily_pnl = total_daily_pnl - commissions;
        let new_portfolio_value = self.current_portfolio_value + net_daily_pnl;

        self.daily_total_pnl = total_daily_pnl;
        self.cumulative_total_pnl += total_daily_pnl;
        self.current_portfolio_value = new_portfolio_value;
        self.current_date = Some(date.to_string());

        DailyPnlResult {
            total_daily_pnl,
            total_commissions: commissions,
            net_daily_pnl,
            new_portfolio_value,
            position_results,
            date: date.to_string(),
            success: true,
        }
    }

    /// Seeds tomorrow's `previous_close_prices` from today's closes.
    pub fn update_previous_closes(&mut self, close_prices: &MarkMap) {
        for (symbol, &price) in close_prices {
            self.previous_close_prices.insert(symbol.clone(), price);
        }
    }

    pub fn set_previous_close(&mut self, symbol: &Symbol, close: Decimal) {
        self.previous_close_prices.insert(symbol.clone(), close);
    }

    pub fn get_previous_close(&self, symbol: &Symbol) -> Option<Decimal> {
        self.previous_close_prices.get(symbol).copied()
    }

    pub fn has_previous_close(&self, symbol: &Symbol) -> bool {
        self.previous_close_prices.contains_key(symbol)
    }

    pub fn reset(&mut self) {
        self.previous_close_prices.clear();
        self.reset_daily();
        self.cumulative_total_pnl = Decimal::ZERO;
        self.position_cumulative_pnl.clear();
    }

    pub fn reset_daily(&mut self) {
        self.daily_total_pnl = Decimal::ZERO;
        self.position_daily_pnl.clear();
        self.current_date = None;
    }

    pub fn get_portfolio_value(&self) -> Decimal {
        self.current_portfolio_value
    }

    pub fn set_portfolio_value(&mut self, value: Decimal) {
        self.current_portfolio_value = value;
    }

    pub fn get_position_daily_pnl(&self, symbol: &Symbol) -> Decimal {
        self.position_daily_pnl
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn get_position_cumulative_pnl(&self, symbol: &Symbol) -> Decimal {
        self.position_cumulative_pnl
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn get_daily_total_pnl(&self) -> Decimal {
        self.daily_total_pnl
    }

    pub fn get_cumulative_total_pnl(&self) -> Decimal {
        self.cumulative_total_pnl
    }

    pub fn get_current_date(&self) -> Option<&str> {
        self.current_date.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_instruments::{InstrumentMeta, StaticInstrumentRegistry};

    fn registry_with(symbol: &str, point_value: f64) -> StaticInstrumentRegistry {
        let mut reg = StaticInstrumentRegistry::new();
        reg.insert(
            symbol,
            InstrumentMeta {
                minimum_price_fluctuation: point_value,
                tick_size: 1.0,
            },
        );
        reg
    }

    #[test]
    fn single_position_pnl_matches_formula() {
        let registry = registry_with("ES", 50.0);
        let mut mgr = PnLManager::new(Decimal::from_f64(100_000.0));
        mgr.set_previous_close(&Symbol::new("ES"), Decimal::from_f64(4500.0));

        let mut closes = MarkMap::new();
        closes.insert(Symbol::new("ES"), Decimal::from_f64(4510.0));

        let mut positions = PositionBook::new();
        positions.insert(Symbol::new("ES"), 2);

        let result = mgr.calculate_daily_pnl(&registry, "2024-01-02", &positions, &closes, Decimal::ZERO);

        // 2 * (4510 - 4500) * 50 = 1000
        assert_eq!(result.total_daily_pnl, Decimal::from_f64(1000.0));
        assert_eq!(result.net_daily_pnl, Decimal::from_f64(1000.0));
        assert_eq!(result.new_portfolio_value, Decimal::from_f64(101_000.0));
    }

    #[test]
    fn missing_previous_close_is_invalid_but_other_symbols_still_compute() {
        let registry = registry_with("ES", 50.0);
        let mut mgr = PnLManager::new(Decimal::from_f64(100_000.0));
        // Only NQ has a seeded previous close.
        mgr.set_previous_close(&Symbol::new("NQ"), Decimal::from_f64(15000.0));

        let mut closes = MarkMap::new();
        closes.insert(Symbol::new("ES"), Decimal::from_f64(4510.0));
        closes.insert(Symbol::new("NQ"), Decimal::from_f64(15010.0));

        let mut positions = PositionBook::new();
        positions.insert(Symbol::new("ES"), 1);
        positions.insert(Symbol::new("NQ"), 1);

        let result = mgr.calculate_daily_pnl(&registry, "2024-01-02", &positions, &closes, Decimal::ZERO);

        assert!(result.success);
        let es_result = &result.position_results[&Symbol::new("ES")];
        assert!(!es_result.valid);
        assert!(es_result.error_message.is_some());

        let nq_result = &result.position_results[&Symbol::new("NQ")];
        assert!(nq_result.valid);
        assert_eq!(result.total_daily_pnl, nq_result.daily_pnl);
    }

    #[test]
    fn negative_close_price_is_invalid_but_other_symbols_still_compute() {
        let registry = registry_with("ES", 50.0);
        let mut mgr = PnLManager::new(Decimal::from_f64(100_000.0));
        mgr.set_previous_close(&Symbol::new("ES"), Decimal::from_f64(4500.0));
        mgr.set_previous_close(&Symbol::new("NQ"), Decimal::from_f64(15000.0));

        let mut closes = MarkMap::new();
        closes.insert(Symbol::new("ES"), Decimal::from_f64(-1.0));
        closes.insert(Symbol::new("NQ"), Decimal::from_f64(15010.0));

        let mut positions = PositionBook::new();
        positions.insert(Symbol::new("ES"), 1);
        positions.insert(Symbol::new("NQ"), 1);

        let result = mgr.calculate_daily_pnl(&registry, "2024-01-02", &positions, &closes, Decimal::ZERO);

        let es_result = &result.position_results[&Symbol::new("ES")];
        assert!(!es_result.valid);
        assert!(es_result.error_message.is_some());

        let nq_result = &result.position_results[&Symbol::new("NQ")];
        assert!(nq_result.valid);
        assert_eq!(result.total_daily_pnl, nq_result.daily_pnl);
    }

    #[test]
    fn reset_daily_preserves_cumulative_and_previous_closes() {
        let registry = registry_with("ES", 50.0);
        let mut mgr = PnLManager::new(Decimal::from_f64(100_000.0));
        mgr.set_previous_close(&Symbol::new("ES"), Decimal::from_f64(4500.0));

        let mut closes = MarkMap::new();
        closes.insert(Symbol::new("ES"), Decimal::from_f64(4510.0));
        let mut positions = PositionBook::new();
        positions.insert(Symbol::new("ES"), 1);

        mgr.calculate_daily_pnl(&registry, "2024-01-02", &positions, &closes, Decimal::ZERO);
        mgr.reset_daily();

        assert_eq!(mgr.get_daily_total_pnl(), Decimal::ZERO);
        assert_ne!(mgr.get_cumulative_total_pnl(), Decimal::ZERO);
        assert!(mgr.has_previous_close(&Symbol::new("ES")));
    }
}
