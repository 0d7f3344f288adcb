//! bt-types
//!
//! Shared data model, error taxonomy, and external-collaborator traits for
//! the backtesting engine: the one crate every other component crate
//! depends on, and the only one that depends on nothing in this workspace.
//!
//! - `Decimal`: fixed-point money/P&L type, no floating-point drift
//! - `Error`: single sum-typed error used across the whole core
//! - `Strategy` / `MarketDataProvider` / `InstrumentRegistry`: the three
//!   external collaborator contracts the coordinator is built around

mod decimal;
mod error;
mod model;
mod traits;

pub use decimal::{Decimal, SCALE};
pub use error::{Error, Result};
pub use model::{
    Bar, BacktestConfig, BacktestResults, CostModel, DailyPnlResult, DynamicOptConfig, Fill,
    MarkMap, OptimizationResult, Position, PositionBook, PositionPnlResult, RiskConfig,
    RiskResult, Side, Symbol,
};
pub use traits::{InstrumentRegistry, MarketDataProvider, Strategy, StrategyInitContext};
