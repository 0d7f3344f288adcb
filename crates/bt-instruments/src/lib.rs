//! bt-instruments
//!
//! Resolves a symbol to its dollar point value. The real registry lookup
//! (contract metadata) is an external collaborator per [`bt_types::InstrumentRegistry`];
//! this crate provides a simple in-memory implementation for tests and
//! file-backed CLI use, plus the fallback table every registry
//! implementation can fall through to when a symbol has no metadata.

mod fallback;
mod registry;

pub use fallback::{extract_base_symbol, fallback_multiplier};
pub use registry::{InstrumentMeta, StaticInstrumentRegistry};
