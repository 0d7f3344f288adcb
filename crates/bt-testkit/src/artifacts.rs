use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bt_types::BacktestResults;

/// Paths of everything [`write_result_artifacts`] wrote under `out_dir`:
/// `orders.csv` / `equity_curve.csv` / `audit.jsonl` and friends.
#[derive(Debug, Clone)]
pub struct ScenarioArtifacts {
    pub results_json: String,
    pub equity_curve_csv: String,
    pub fills_csv: String,
    pub audit_jsonl: String,
}

/// Persists a completed backtest run under `out_dir`:
/// - `results.json` — pretty `serde_json` of the full `BacktestResults`
/// - `equity_curve.csv` — `day_id,value`
/// - `fills.csv` — one row per execution
/// - `audit.jsonl` — one JSON line per day carrying that day's risk metrics
pub fn write_result_artifacts(out_dir: impl AsRef<Path>, results: &BacktestResults, config_hash: &str) -> Result<ScenarioArtifacts> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir).with_context(|| format!("create_dir_all {}", out_dir.display()))?;

    let results_json_path = out_dir.join("results.json");
    let results_json = serde_json::to_string_pretty(results).context("serialize BacktestResults")?;
    fs::write(&results_json_path, &results_json).with_context(|| format!("write {}", results_json_path.display()))?;

    let equity_curve_path = out_dir.join("equity_curve.csv");
    {
        let mut w = csv::Writer::from_path(&equity_curve_path)
            .with_context(|| format!("open {}", equity_curve_path.display()))?;
        w.write_record(["day_id", "value"])?;
        for (day_id, value) in &results.equity_curve {
            w.write_record([day_id.to_string(), value.to_f64().to_string()])?;
        }
        w.flush()?;
    }

    let fills_path = out_dir.join("fills.csv");
    {
        let mut w = csv::Writer::from_path(&fills_path).with_context(|| format!("open {}", fills_path.display()))?;
        w.write_record([
            "day_id",
            "symbol",
            "side",
            "quantity",
            "fill_price",
            "commissions_fees",
            "slippage_market_impact",
            "total_transaction_costs",
            "order_id",
            "exec_id",
        ])?;
        for fill in &results.executions {
            w.write_record([
                fill.day_id.to_string(),
                fill.symbol.to_string(),
                fill.side.to_string(),
                fill.quantity.to_string(),
                fill.fill_price.to_f64().to_string(),
                fill.commissions_fees.to_f64().to_string(),
                fill.slippage_market_impact.to_f64().to_string(),
                fill.total_transaction_costs.to_f64().to_string(),
                fill.order_id.clone(),
                fill.exec_id.clone(),
            ])?;
        }
        w.flush()?;
    }

    let audit_path = out_dir.join("audit.jsonl");
    {
        let mut lines = Vec::with_capacity(results.risk_metrics.len());
        for (day_id, risk) in &results.risk_metrics {
            let line = serde_json::json!({
                "day_id": day_id,
                "config_hash": config_hash,
                "risk_exceeded": risk.risk_exceeded,
                "recommended_scale": risk.recommended_scale,
            });
            lines.push(line.to_string());
        }
        fs::write(&audit_path, lines.join("\n")).with_context(|| format!("write {}", audit_path.display()))?;
    }

    Ok(ScenarioArtifacts {
        results_json: results_json_path.display().to_string(),
        equity_curve_csv: equity_curve_path.display().to_string(),
        fills_csv: fills_path.display().to_string(),
        audit_jsonl: audit_path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_types::{Decimal, RiskResult};

    #[test]
    fn writes_all_four_artifacts_with_expected_row_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = BacktestResults::default();
        results.equity_curve = vec![(0, Decimal::from_f64(1_000_000.0)), (1, Decimal::from_f64(1_001_000.0))];
        results.risk_metrics = vec![(0, RiskResult::unconstrained())];

        let artifacts = write_result_artifacts(dir.path(), &results, "deadbeef").unwrap();

        let equity_contents = fs::read_to_string(&artifacts.equity_curve_csv).unwrap();
        assert_eq!(equity_contents.lines().count(), 3); // header + 2 rows

        let audit_contents = fs::read_to_string(&artifacts.audit_jsonl).unwrap();
        assert_eq!(audit_contents.lines().count(), 1);
        assert!(audit_contents.contains("deadbeef"));

        let results_contents = fs::read_to_string(&artifacts.results_json).unwrap();
        let parsed: BacktestResults = serde_json::from_str(&results_contents).unwrap();
        assert_eq!(parsed.equity_curve.len(), 2);
    }
}
