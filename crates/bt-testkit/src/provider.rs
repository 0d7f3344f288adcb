use std::collections::BTreeMap;

use bt_types::{Bar, Error, MarketDataProvider, Symbol};

/// A `MarketDataProvider` backed by an in-memory map from `day_id` to that
/// day's bars, for scenario tests and demos that don't need a real feed.
#[derive(Clone, Debug, Default)]
pub struct FixtureMarketDataProvider {
    bars: BTreeMap<i64, Vec<Bar>>,
    day_range: (i64, i64),
}

impl FixtureMarketDataProvider {
    pub fn new(bars: Vec<Bar>) -> Self {
        let mut by_day: BTreeMap<i64, Vec<Bar>> = BTreeMap::new();
        for b in bars {
            by_day.entry(b.day_id).or_default().push(b);
        }
        let day_range = match (by_day.keys().next(), by_day.keys().next_back()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0, -1),
        };
        FixtureMarketDataProvider { bars: by_day, day_range }
    }
}

impl MarketDataProvider for FixtureMarketDataProvider {
    fn bars_for_day(&self, day_id: i64, symbols: &[Symbol]) -> Result<Vec<Bar>, Error> {
        let Some(bars) = self.bars.get(&day_id) else {
            return Ok(Vec::new());
        };
        Ok(bars
            .iter()
            .filter(|b| symbols.iter().any(|s| s == &b.symbol))
            .cloned()
            .collect())
    }

    fn day_range(&self) -> (i64, i64) {
        self.day_range
    }
}
