use bt_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
backtest:
  cost_model: "new"
  warmup_days: 20
risk:
  max_gross_leverage: 4.0
  max_net_leverage: 2.0
"#;

const BASE_YAML_REORDERED: &str = r#"
risk:
  max_net_leverage: 2.0
  max_gross_leverage: 4.0
backtest:
  warmup_days: 20
  cost_model: "new"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn overlay_layer_changes_hash_and_wins_the_merge() {
    let overlay = r#"
risk:
  max_gross_leverage: 1.5
"#;
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, overlay]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let v = layered
        .config_json
        .pointer("/risk/max_gross_leverage")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert_eq!(v, 1.5);
}
