//! JSON transcoding: convert YAML values to JSON text.
//!
//! Mapping from YAML to JSON:
//!   - Value::Null          -> null
//!   - Value::Bool          -> true / false
//!   - Value::Integer       -> number if it fits i64 or u64, else a string of digits
//!   - Value::Float         -> number (.nan and .inf are rejected)
//!   - Value::String        -> string
//!   - Value::Bytes         -> string (base64-encoded)
//!   - Value::Sequence      -> array
//!   - Value::Mapping       -> object, in source order; non-string keys are
//!                             written as their YAML text

use base64::prelude::*;
use libyamp::{stringify_value, StringifyOptions, Value};
use num_traits::ToPrimitive;

/// Encode a value as pretty-printed JSON.
pub fn encode(value: &Value) -> Result<String, String> {
    let json = value_to_json(value)?;
    serde_json::to_string_pretty(&json).map_err(|e| format!("JSON encode error: {}", e))
}

fn value_to_json(value: &Value) -> Result<serde_json::Value, String> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(n) => {
            if let Some(i) = n.to_i64() {
                Ok(serde_json::Value::from(i))
            } else if let Some(u) = n.to_u64() {
                Ok(serde_json::Value::from(u))
            } else {
                Ok(serde_json::Value::String(n.to_string()))
            }
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| format!("{:?} has no JSON representation", value)),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Bytes(b) => Ok(serde_json::Value::String(BASE64_STANDARD.encode(b))),
        Value::Sequence(items) => {
            let items: Result<Vec<serde_json::Value>, String> = items.iter().map(value_to_json).collect();
            Ok(serde_json::Value::Array(items?))
        }
        Value::Mapping(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(key_to_string(k), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(map))
        }
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => {
            let opts = StringifyOptions::default().with_line_width(0);
            stringify_value(other, &opts).trim_end().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_scalars_and_order() {
        let value = Value::Mapping(vec![
            ("z".into(), 1i64.into()),
            ("a".into(), Value::Sequence(vec![Value::Null, true.into(), 1.5.into()])),
        ]);
        let json = encode(&value).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!({"z": 1, "a": [null, true, 1.5]}));
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
    }

    #[test]
    fn test_big_integers_become_strings() {
        let big: BigInt = "123456789012345678901234567890".parse().unwrap();
        let json = value_to_json(&Value::Integer(big)).unwrap();
        assert_eq!(json, serde_json::json!("123456789012345678901234567890"));
        let json = value_to_json(&Value::Integer(BigInt::from(u64::MAX))).unwrap();
        assert_eq!(json, serde_json::json!(u64::MAX));
    }

    #[test]
    fn test_bytes_and_keys() {
        let value = Value::Mapping(vec![
            (Value::Integer(BigInt::from(7)), Value::Bytes(b"hi".to_vec())),
            (Value::Null, Value::Null),
        ]);
        let json = value_to_json(&value).unwrap();
        assert_eq!(json, serde_json::json!({"7": "aGk=", "null": null}));
    }

    #[test]
    fn test_nan_is_rejected() {
        assert!(encode(&Value::Float(f64::NAN)).is_err());
    }
}
