use std::collections::BTreeMap;

use crate::{Bar, Error, Symbol};

/// Context handed to a strategy once, before the first bar.
#[derive(Clone, Debug)]
pub struct StrategyInitContext {
    pub symbols: Vec<Symbol>,
    pub initial_capital: f64,
}

/// Strategy capability set. No IO, no wall-clock reads, no broker/DB
/// access — a strategy is a pure function of the bars it is shown plus
/// whatever state it keeps internally between calls.
pub trait Strategy: Send + Sync {
    fn initialize(&mut self, ctx: &StrategyInitContext) -> Result<(), Error>;

    fn start(&mut self) -> Result<(), Error>;

    fn stop(&mut self) -> Result<(), Error>;

    /// Called once per day with the day's complete bars. The strategy
    /// updates whatever internal state it needs; positions are read back
    /// afterward via `get_positions`/`get_target_positions`.
    fn on_data(&mut self, bars: &[Bar]) -> Result<(), Error>;

    /// Current desired positions, signed quantity per symbol.
    fn get_positions(&self) -> BTreeMap<Symbol, i64>;

    /// Optional explicit target-position output. When absent, the
    /// coordinator falls back to treating `get_positions` as the target.
    fn get_target_positions(&self) -> Option<BTreeMap<Symbol, i64>> {
        None
    }

    /// Optional price history the strategy has accumulated, exposed for
    /// diagnostics/persistence. Not required for correctness of the day
    /// loop.
    fn get_price_history(&self) -> BTreeMap<Symbol, Vec<f64>> {
        BTreeMap::new()
    }
}

/// Supplies a day's worth of bars for a set of symbols. The only
/// collaborator whose call is allowed to block the coordinator — the
/// initial market data load.
pub trait MarketDataProvider: Send + Sync {
    fn bars_for_day(&self, day_id: i64, symbols: &[Symbol]) -> Result<Vec<Bar>, Error>;

    /// Inclusive day range this provider can serve, used by the
    /// coordinator to bound its loop without guessing.
    fn day_range(&self) -> (i64, i64);
}

/// Resolves a symbol to its dollar point value
/// (`minimum_price_fluctuation / tick_size`).
pub trait InstrumentRegistry: Send + Sync {
    fn point_value(&self, symbol: &Symbol) -> Option<f64>;
}
