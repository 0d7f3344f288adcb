use anyhow::{Context, Result};
use bt_types::{Bar, Decimal, Symbol};

/// Loads bars from a CSV with columns
/// `symbol,day_id,open,high,low,close,volume,is_complete`.
pub fn load_bars_csv(path: &str) -> Result<Vec<Bar>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open bars csv: {path}"))?;
    let mut out = Vec::new();

    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("read record from {path}"))?;
        let b = Bar {
            symbol: Symbol::new(rec[0].to_string()),
            day_id: rec[1].parse().context("parse day_id")?,
            open: Decimal::from_f64(rec[2].parse().context("parse open")?),
            high: Decimal::from_f64(rec[3].parse().context("parse high")?),
            low: Decimal::from_f64(rec[4].parse().context("parse low")?),
            close: Decimal::from_f64(rec[5].parse().context("parse close")?),
            volume: rec[6].parse().context("parse volume")?,
            is_complete: rec[7].parse().context("parse is_complete")?,
        };
        out.push(b);
    }

    for w in out.windows(2) {
        if w[0].symbol == w[1].symbol && !(w[0].day_id < w[1].day_id) {
            anyhow::bail!("bars for {} are not strictly increasing by day_id", w[0].symbol);
        }
    }

    Ok(out)
}

/// Terse builder for an inline complete bar in tests.
pub fn bar(symbol: &str, day_id: i64, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Bar {
    Bar::new(
        symbol,
        day_id,
        Decimal::from_f64(open),
        Decimal::from_f64(high),
        Decimal::from_f64(low),
        Decimal::from_f64(close),
        volume,
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_well_formed_bars_csv() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "symbol,day_id,open,high,low,close,volume,is_complete").unwrap();
        writeln!(f, "ES,0,100.0,101.0,99.0,100.5,1000,true").unwrap();
        writeln!(f, "ES,1,100.5,102.0,100.0,101.5,1200,true").unwrap();
        let bars = load_bars_csv(f.path().to_str().unwrap()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].day_id, 1);
        assert_eq!(bars[0].close.to_f64(), 100.5);
    }

    #[test]
    fn rejects_non_increasing_day_ids_for_the_same_symbol() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "symbol,day_id,open,high,low,close,volume,is_complete").unwrap();
        writeln!(f, "ES,1,100.0,101.0,99.0,100.5,1000,true").unwrap();
        writeln!(f, "ES,0,99.0,100.0,98.0,99.5,900,true").unwrap();
        let err = load_bars_csv(f.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }
}
