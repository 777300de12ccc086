//! Precise numeric decoding for exchange and store-query JSON.
//!
//! Trade ids and book sequence numbers are 64-bit integers. Decoding them
//! through `serde_json::Value::as_f64` silently loses precision past 2^53.
//! Every decode boundary in this crate goes through these helpers, which
//! read `serde_json::Number` directly instead of implicitly widening to
//! `f64` first.

use crate::error::DecodeError;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub fn to_f64(value: &Value, field: &'static str, context: &'static str) -> Result<f64, DecodeError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| DecodeError::NumericConversion {
            field,
            detail: format!("{n} is not representable as f64"),
        }),
        Value::String(s) => s.parse::<f64>().map_err(|e| DecodeError::NumericConversion {
            field,
            detail: e.to_string(),
        }),
        other => Err(DecodeError::UnexpectedShape {
            field,
            context,
            detail: format!("expected number, got {other}"),
        }),
    }
}

pub fn to_i64(value: &Value, field: &'static str, context: &'static str) -> Result<i64, DecodeError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| DecodeError::NumericConversion {
            field,
            detail: format!("{n} is not representable as i64"),
        }),
        Value::String(s) => s.parse::<i64>().map_err(|e| DecodeError::NumericConversion {
            field,
            detail: e.to_string(),
        }),
        other => Err(DecodeError::UnexpectedShape {
            field,
            context,
            detail: format!("expected integer, got {other}"),
        }),
    }
}

pub fn to_str<'a>(value: &'a Value, field: &'static str, context: &'static str) -> Result<&'a str, DecodeError> {
    value.as_str().ok_or_else(|| DecodeError::UnexpectedShape {
        field,
        context,
        detail: format!("expected string, got {value}"),
    })
}

pub fn to_rfc3339(value: &Value, field: &'static str, context: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    let s = to_str(value, field, context)?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DecodeError::NumericConversion {
            field,
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_large_trade_id_without_precision_loss() {
        let v = json!(9_007_199_254_740_993i64); // 2^53 + 1
        let got = to_i64(&v, "trade_id", "test").unwrap();
        assert_eq!(got, 9_007_199_254_740_993i64);
    }

    #[test]
    fn rejects_non_numeric_field() {
        let v = json!("not a number at all");
        assert!(to_i64(&v, "trade_id", "test").is_err());
    }

    #[test]
    fn numeric_string_is_accepted() {
        let v = json!("123.5");
        assert_eq!(to_f64(&v, "rate", "test").unwrap(), 123.5);
    }
}
