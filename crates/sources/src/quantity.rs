//! Lenient numeric parsing for heterogeneous API payloads
//!
//! Nodes answer with hex quantities (`"0x1b4"`), explorers with decimal
//! strings or numbers, and Quai headers with one entry per chain context.
//! Arrays resolve to their last element (the zone context).

use serde_json::Value;

/// Parse an unsigned quantity
pub fn parse_quantity(value: &Value) -> Option<u64> {
    parse_u128(value).and_then(|v| u64::try_from(v).ok())
}

/// Parse any numeric representation as a float
pub fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = strip_hex(s) {
                parse_hex(hex).map(|v| v as f64)
            } else {
                s.parse::<f64>().ok().filter(|v| v.is_finite())
            }
        }
        Value::Array(items) => items.last().and_then(parse_float),
        _ => None,
    }
}

/// Parse an unsigned quantity too large for `u64` (wei balances)
pub fn parse_u128(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u128)),
        Value::String(s) => {
            let s = s.trim();
            match strip_hex(s) {
                Some(hex) => parse_hex(hex),
                None => s.parse::<u128>().ok(),
            }
        }
        Value::Array(items) => items.last().and_then(parse_u128),
        _ => None,
    }
}

fn strip_hex(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn parse_hex(digits: &str) -> Option<u128> {
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}

/// Follow the first path that resolves to a non-null value
pub fn lookup<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(value, |current, key| current.get(key))
            .filter(|found| !found.is_null())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quantity_forms() {
        assert_eq!(parse_quantity(&json!("0x1b4")), Some(436));
        assert_eq!(parse_quantity(&json!("0x")), Some(0));
        assert_eq!(parse_quantity(&json!("436")), Some(436));
        assert_eq!(parse_quantity(&json!(436)), Some(436));
        assert_eq!(parse_quantity(&json!(["0x1", "0x2", "0x1b4"])), Some(436));
        assert_eq!(parse_quantity(&json!("zz")), None);
        assert_eq!(parse_quantity(&json!(null)), None);
        assert_eq!(parse_quantity(&json!(-4)), None);
    }

    #[test]
    fn test_parse_float_forms() {
        assert_eq!(parse_float(&json!("12.5")), Some(12.5));
        assert_eq!(parse_float(&json!(3)), Some(3.0));
        assert_eq!(parse_float(&json!("0x10")), Some(16.0));
        assert_eq!(parse_float(&json!("NaN")), None);
        assert_eq!(parse_float(&json!({"a": 1})), None);
    }

    #[test]
    fn test_lookup_first_present_path() {
        let block = json!({"header": {"difficulty": "0x10"}, "difficulty": null});
        let found = lookup(&block, &[&["difficulty"], &["header", "difficulty"]]);
        assert_eq!(found, Some(&json!("0x10")));
        assert_eq!(lookup(&block, &[&["missing"]]), None);
    }
}
