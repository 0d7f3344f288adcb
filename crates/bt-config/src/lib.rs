//! Layered YAML/JSON config loading, canonicalization, and hashing for the
//! backtest engine. Library boundary: everything here returns
//! `bt_types::Error`, never `anyhow` — `anyhow` is reserved for the
//! `bt-cli` binary boundary.

mod schema;

use std::fs;
use std::path::Path;

use bt_types::Error;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use schema::ConfigFile;

/// Result of loading and merging one or more config layers.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load + merge YAML files in order, then canonicalize to JSON and hash.
/// Later files override earlier files via deep-merge.
pub fn load_layered_yaml(paths: &[impl AsRef<Path>]) -> Result<LoadedConfig, Error> {
    let mut sources = Vec::with_capacity(paths.len());
    for p in paths {
        let p = p.as_ref();
        let s = fs::read_to_string(p)
            .map_err(|e| Error::DataUnavailable(format!("read config {}: {e}", p.display())))?;
        sources.push(s);
    }
    load_layered_yaml_from_strings(&sources.iter().map(String::as_str).collect::<Vec<_>>())
}

/// Same as [`load_layered_yaml`] but takes already-read YAML source strings,
/// so callers (and tests) don't need real files on disk.
pub fn load_layered_yaml_from_strings(sources: &[&str]) -> Result<LoadedConfig, Error> {
    let mut merged = Value::Object(Default::default());

    for (i, s) in sources.iter().enumerate() {
        let yaml_val: serde_yaml::Value = serde_yaml::from_str(s)
            .map_err(|e| Error::InvalidData(format!("parse yaml layer {i}: {e}")))?;
        let json_val = serde_json::to_value(yaml_val)
            .map_err(|e| Error::InvalidData(format!("yaml->json conversion failed: {e}")))?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    let config_json = serde_json::from_str(&canonical)
        .map_err(|e| Error::Internal(format!("canonical json parse failed: {e}")))?;

    Ok(LoadedConfig {
        config_json,
        canonical_json: canonical,
        config_hash: hash,
    })
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting
/// compact JSON, so the hash depends only on content, not source key order.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Parses a `YYYY-MM-DD` CLI date string into the engine's opaque day id
/// (days since the proleptic Gregorian calendar epoch, `chrono`'s CE day
/// count — the same scale `bt_types::Bar::day_id` uses).
pub fn parse_date_to_day_id(s: &str) -> Result<i64, Error> {
    use chrono::Datelike;
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::InvalidArgument(format!("invalid date {s:?}: {e}")))?;
    Ok(date.num_days_from_ce() as i64)
}
