use std::collections::BTreeMap;

use bt_types::{InstrumentRegistry, Symbol};

use crate::fallback::{extract_base_symbol, fallback_multiplier};

/// Minimal contract metadata: enough to derive a point value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstrumentMeta {
    pub minimum_price_fluctuation: f64,
    pub tick_size: f64,
}

impl InstrumentMeta {
    pub fn point_value(self) -> f64 {
        self.minimum_price_fluctuation / self.tick_size
    }
}

/// In-memory registry, keyed by exact symbol. Falls through to the static
/// fallback table (matched against the symbol's contract root) when a
/// symbol has no entry, matching the behavior a database-backed registry
/// is expected to provide.
#[derive(Clone, Debug, Default)]
pub struct StaticInstrumentRegistry {
    instruments: BTreeMap<Symbol, InstrumentMeta>,
}

impl StaticInstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<Symbol>, meta: InstrumentMeta) -> &mut Self {
        self.instruments.insert(symbol.into(), meta);
        self
    }
}

impl InstrumentRegistry for StaticInstrumentRegistry {
    fn point_value(&self, symbol: &Symbol) -> Option<f64> {
        if let Some(meta) = self.instruments.get(symbol) {
            return Some(meta.point_value());
        }
        let root = extract_base_symbol(symbol.as_str());
        fallback_multiplier(root)
    }
}
