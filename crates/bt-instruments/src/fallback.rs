const MONTH_CODES: &[char] = &[
    'F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z',
];

/// Strips a trailing contract-month/year suffix (`ESZ5` -> `ES`,
/// `CLF25` -> `CL`) so a dated contract symbol can be matched against the
/// fallback multiplier table by its root. Symbols with no recognizable
/// month-code suffix are returned unchanged.
pub fn extract_base_symbol(symbol: &str) -> &str {
    let chars: Vec<char> = symbol.chars().collect();
    if chars.len() < 3 {
        return symbol;
    }

    let mut digit_count = 0;
    for &c in chars.iter().rev() {
        if c.is_ascii_digit() {
            digit_count += 1;
        } else {
            break;
        }
    }
    if digit_count == 0 || digit_count > 2 {
        return symbol;
    }

    let month_idx = chars.len() - digit_count - 1;
    if !MONTH_CODES.contains(&chars[month_idx]) {
        return symbol;
    }
    if month_idx == 0 {
        return symbol;
    }

    &symbol[..month_idx]
}

/// Known point values (`minimum_price_fluctuation / tick_size`, expressed
/// directly as dollars-per-point) for common futures roots, used when the
/// instrument registry has no metadata for a symbol. Not exhaustive —
/// expand as new symbols are traded.
pub fn fallback_multiplier(root_symbol: &str) -> Option<f64> {
    let value = match root_symbol {
        "ES" => 50.0,
        "NQ" => 20.0,
        "YM" => 5.0,
        "RTY" => 50.0,
        "CL" => 1000.0,
        "GC" => 100.0,
        "SI" => 5000.0,
        "ZN" => 1000.0,
        "ZB" => 1000.0,
        "ZC" => 50.0,
        "ZS" => 50.0,
        "ZW" => 50.0,
        "6E" => 125000.0,
        "6J" => 12500000.0,
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_digit_year_suffix() {
        assert_eq!(extract_base_symbol("ESZ5"), "ES");
    }

    #[test]
    fn strips_two_digit_year_suffix() {
        assert_eq!(extract_base_symbol("CLF25"), "CL");
    }

    #[test]
    fn leaves_unsuffixed_symbol_alone() {
        assert_eq!(extract_base_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn leaves_short_symbol_alone() {
        assert_eq!(extract_base_symbol("ES"), "ES");
    }

    #[test]
    fn known_roots_resolve() {
        assert_eq!(fallback_multiplier("ES"), Some(50.0));
        assert_eq!(fallback_multiplier("CL"), Some(1000.0));
    }

    #[test]
    fn unknown_root_is_none() {
        assert_eq!(fallback_multiplier("ZZZZ"), None);
    }
}
