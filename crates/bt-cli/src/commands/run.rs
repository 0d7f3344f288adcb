use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use bt_config::{parse_date_to_day_id, ConfigFile};
use bt_coordinator::BacktestCoordinator;
use bt_instruments::StaticInstrumentRegistry;
use bt_testkit::{load_bars_csv, write_result_artifacts, BuyAndHoldStrategy, FixtureMarketDataProvider, FlatStrategy};
use bt_types::BacktestResults;

use super::parse_symbols;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config layer paths, in merge order (base -> overlay -> overlay...).
    #[arg(long = "config", required = true)]
    pub config: Vec<PathBuf>,

    /// Comma-separated symbol list, e.g. "ES,NQ".
    #[arg(long)]
    pub symbols: String,

    /// Inclusive start date, "YYYY-MM-DD".
    #[arg(long)]
    pub start: String,

    /// Inclusive end date, "YYYY-MM-DD".
    #[arg(long)]
    pub end: String,

    /// Output directory for results.json / equity_curve.csv / fills.csv / audit.jsonl.
    #[arg(long)]
    pub out: PathBuf,

    /// CSV of bars: symbol,day_id,open,high,low,close,volume,is_complete.
    #[arg(long)]
    pub bars: PathBuf,

    /// Reference strategy to drive the run: "flat" or "buy-and-hold".
    #[arg(long, default_value = "flat")]
    pub strategy: String,

    /// Per-symbol target quantity for the "buy-and-hold" strategy.
    #[arg(long, default_value_t = 1)]
    pub target_qty: i64,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let symbols = parse_symbols(&args.symbols)?;
    let start_day = parse_date_to_day_id(&args.start)?;
    let end_day = parse_date_to_day_id(&args.end)?;

    let loaded = bt_config::load_layered_yaml(&args.config)?;
    let config_file = ConfigFile::from_json(&loaded.config_json)?;
    let config = config_file.into_backtest_config(symbols.clone(), start_day, end_day)?;

    let bars = load_bars_csv(args.bars.to_str().context("--bars path must be valid UTF-8")?)?;
    let provider = FixtureMarketDataProvider::new(bars);
    let registry = StaticInstrumentRegistry::new();

    let run_id = format!("BT-{}", Uuid::new_v4());
    let git_hash = super::get_git_hash().unwrap_or_else(|| "UNKNOWN".to_string());

    let results: BacktestResults = match args.strategy.as_str() {
        "flat" => {
            let mut coordinator = BacktestCoordinator::new(config, registry, provider, FlatStrategy::default());
            coordinator.run(|| false)?
        }
        "buy-and-hold" => {
            let target = symbols.iter().map(|s| (s.clone(), args.target_qty)).collect();
            let mut coordinator =
                BacktestCoordinator::new(config, registry, provider, BuyAndHoldStrategy::new(target));
            coordinator.run(|| false)?
        }
        other => anyhow::bail!("unknown --strategy '{other}', expected \"flat\" or \"buy-and-hold\""),
    };

    let artifacts = write_result_artifacts(&args.out, &results, &loaded.config_hash)?;

    println!("run_id={run_id}");
    println!("git_hash={git_hash}");
    println!("config_hash={}", loaded.config_hash);
    println!("total_return={:.6}", results.total_return);
    println!("sharpe_ratio={:.6}", results.sharpe_ratio);
    println!("max_drawdown={:.6}", results.max_drawdown);
    println!("results_json={}", artifacts.results_json);
    println!("equity_curve_csv={}", artifacts.equity_curve_csv);
    println!("fills_csv={}", artifacts.fills_csv);
    println!("audit_jsonl={}", artifacts.audit_jsonl);

    Ok(())
}
