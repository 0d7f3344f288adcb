//! Test fixtures and scenario-running helpers for the backtest engine:
//! CSV bar fixtures, a fixed in-memory `MarketDataProvider`, a couple of
//! reference `Strategy` implementations, and a result-artifact writer
//! producing `orders.csv` / `equity_curve.csv` / `audit.jsonl`.

mod artifacts;
mod fixtures;
mod provider;
mod strategies;

pub use artifacts::{write_result_artifacts, ScenarioArtifacts};
pub use fixtures::{bar, load_bars_csv};
pub use provider::FixtureMarketDataProvider;
pub use strategies::{BuyAndHoldStrategy, FlatStrategy};
