//! Command handler modules for `bt-cli`. One file per subcommand.

pub mod run;

use anyhow::Result;
use bt_types::Symbol;

/// Parses a comma-separated `--symbols` argument, trimming whitespace and
/// dropping empty entries.
pub fn parse_symbols(raw: &str) -> Result<Vec<Symbol>> {
    let symbols: Vec<Symbol> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Symbol::new)
        .collect();
    if symbols.is_empty() {
        anyhow::bail!("--symbols must contain at least one symbol");
    }
    Ok(symbols)
}

/// Best-effort git hash (short), for tagging a run's provenance.
pub fn get_git_hash() -> Option<String> {
    let out = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout).ok().map(|s| s.trim().to_string())
}
