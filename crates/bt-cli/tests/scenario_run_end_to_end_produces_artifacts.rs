use std::fs;
use std::io::Write;

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// End-to-end: `bt run` over a tiny two-day fixture produces the expected
/// artifact bundle and prints the summary lines a caller can scrape.
#[test]
fn run_over_fixture_bars_writes_results_and_prints_summary() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;

    let config_path = tmp.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
backtest:
  cost_model: "legacy"
  use_risk_management: false
  use_optimization: false
  warmup_days: 0
"#,
    )?;

    let bars_path = tmp.path().join("bars.csv");
    let mut f = fs::File::create(&bars_path)?;
    writeln!(f, "symbol,day_id,open,high,low,close,volume,is_complete")?;
    writeln!(f, "ES,738886,100.0,101.0,99.0,100.0,1000,true")?;
    writeln!(f, "ES,738887,100.0,102.0,99.5,101.0,1200,true")?;

    let out_dir = tmp.path().join("out");

    let mut cmd = assert_cmd::Command::cargo_bin("bt")?;
    cmd.args([
        "run",
        "--config",
        config_path.to_str().unwrap(),
        "--symbols",
        "ES",
        "--start",
        "2024-01-01",
        "--end",
        "2024-01-02",
        "--bars",
        bars_path.to_str().unwrap(),
        "--out",
        out_dir.to_str().unwrap(),
        "--strategy",
        "buy-and-hold",
        "--target-qty",
        "2",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("results_json="));

    assert!(out_dir.join("results.json").exists());
    assert!(out_dir.join("equity_curve.csv").exists());
    assert!(out_dir.join("fills.csv").exists());
    assert!(out_dir.join("audit.jsonl").exists());

    Ok(())
}

#[test]
fn unknown_strategy_fails_with_a_clear_message() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = tmp.path().join("config.yaml");
    fs::write(&config_path, "{}\n")?;
    let bars_path = tmp.path().join("bars.csv");
    fs::write(&bars_path, "symbol,day_id,open,high,low,close,volume,is_complete\n")?;

    let mut cmd = assert_cmd::Command::cargo_bin("bt")?;
    cmd.args([
        "run",
        "--config",
        config_path.to_str().unwrap(),
        "--symbols",
        "ES",
        "--start",
        "2024-01-01",
        "--end",
        "2024-01-02",
        "--bars",
        bars_path.to_str().unwrap(),
        "--out",
        tmp.path().join("out").to_str().unwrap(),
        "--strategy",
        "quantum",
    ]);

    cmd.assert().failure().stderr(predicate::str::contains("unknown --strategy"));

    Ok(())
}
