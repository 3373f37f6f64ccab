//! Dynamic contract values
//!
//! Contract data flows through the [`Value`] sum type; every host function
//! consumes and produces it. Coercion rules are centralised here so the
//! compiler, the VM, and the extend library agree on numeric semantics.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A dynamically-typed contract value.
///
/// `Map` uses a `BTreeMap` so JSON encoding is deterministic with sorted
/// keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Money(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Type name used in error messages and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Money(_) => "money",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Converts to i64. Non-convertible values fail with `ConversionError`.
    pub fn to_int(&self) -> EngineResult<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            Value::Money(v) => v
                .to_i64()
                .ok_or_else(|| EngineError::Conversion(format!("{} does not fit int", v))),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| EngineError::Conversion(format!("cannot convert {:?} to int", s))),
            Value::Bool(b) => Ok(*b as i64),
            other => Err(EngineError::Conversion(format!(
                "cannot convert {} to int",
                other.type_name()
            ))),
        }
    }

    /// Converts to f64. Mirrors the lenient float coercion of the contract
    /// language: values with no numeric reading become 0.
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Money(v) => v.to_f64().unwrap_or(0.0),
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Value::Bool(b) => *b as i64 as f64,
            _ => 0.0,
        }
    }

    /// Converts to arbitrary-precision money.
    pub fn to_money(&self) -> EngineResult<Decimal> {
        match self {
            Value::Money(v) => Ok(*v),
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::Float(v) => Decimal::from_f64(*v)
                .ok_or_else(|| EngineError::Conversion(format!("{} is not a money value", v))),
            Value::Str(s) => s
                .trim()
                .parse::<Decimal>()
                .map_err(|_| EngineError::Conversion(format!("cannot convert {:?} to money", s))),
            other => Err(EngineError::Conversion(format!(
                "cannot convert {} to money",
                other.type_name()
            ))),
        }
    }

    /// Display form, the `Str` host-function semantics: floats format with
    /// six decimal places, everything else generically.
    pub fn to_display(&self) -> String {
        match self {
            Value::Float(v) => format!("{:.6}", v),
            other => other.to_string(),
        }
    }

    /// Truthiness used by `conditions`, `if` and `while`: zero numbers,
    /// empty/`"0"` strings, empty collections and nil are false.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Money(v) => !v.is_zero(),
            Value::Str(s) => !s.is_empty() && s != "0" && s != "false",
            Value::Bytes(b) => !b.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Element count for the `Len` host function; 0 for scalars.
    pub fn len(&self) -> i64 {
        match self {
            Value::Str(s) => s.len() as i64,
            Value::Bytes(b) => b.len() as i64,
            Value::Array(a) => a.len() as i64,
            Value::Map(m) => m.len() as i64,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index into arrays (by int) and maps (by string key).
    pub fn index(&self, key: &Value) -> EngineResult<Value> {
        match self {
            Value::Array(items) => {
                let i = key.to_int()?;
                if i < 0 || i as usize >= items.len() {
                    return Err(EngineError::InvalidObject(format!(
                        "index {} out of range",
                        i
                    )));
                }
                Ok(items[i as usize].clone())
            }
            Value::Map(map) => Ok(map.get(&key.to_display()).cloned().unwrap_or(Value::Null)),
            other => Err(EngineError::InvalidObject(format!(
                "cannot index {}",
                other.type_name()
            ))),
        }
    }

    /// Builds a `Value` from parsed JSON. Numbers with a fractional part
    /// become floats, whole numbers ints.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts into a `serde_json::Value`. Total over the `Value` domain:
    /// money and bytes serialize as strings, map keys come out sorted.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Money(v) => serde_json::Value::String(v.to_string()),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// `JSONDecode` semantics.
    pub fn json_decode(input: &str) -> EngineResult<Value> {
        let parsed: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
        Ok(Value::from_json(parsed))
    }

    /// `JSONEncode` semantics: deterministic, keys sorted.
    pub fn json_encode(&self) -> EngineResult<String> {
        serde_json::to_string(&self.to_json()).map_err(|e| EngineError::JsonMarshall(e.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Money(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", hex::encode(b)),
            Value::Array(_) | Value::Map(_) => {
                write!(f, "{}", self.json_encode().unwrap_or_default())
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Money(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn int_coercion() {
        assert_eq!(Value::Str(" 42 ".into()).to_int().unwrap(), 42);
        assert_eq!(Value::Float(7.9).to_int().unwrap(), 7);
        assert!(Value::Str("4x2".into()).to_int().is_err());
        assert!(Value::Array(vec![]).to_int().is_err());
    }

    #[test]
    fn float_coercion_is_lenient() {
        assert_eq!(Value::Str("2.5".into()).to_float(), 2.5);
        assert_eq!(Value::Str("junk".into()).to_float(), 0.0);
        assert_eq!(Value::Null.to_float(), 0.0);
    }

    #[test]
    fn money_from_string_keeps_precision() {
        let m = Value::Str("12345678901234567890.123456789".into())
            .to_money()
            .unwrap();
        assert_eq!(m.to_string(), "12345678901234567890.123456789");
    }

    #[test]
    fn float_display_uses_six_places() {
        assert_eq!(Value::Float(1.5).to_display(), "1.500000");
        assert_eq!(Value::Int(3).to_display(), "3");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Str("0".into()).as_bool());
        assert!(!Value::Str("".into()).as_bool());
        assert!(Value::Str("x".into()).as_bool());
        assert!(!Value::Int(0).as_bool());
        assert!(Value::Int(-1).as_bool());
        assert!(!Value::Null.as_bool());
    }

    #[test]
    fn json_round_trip_sorted_keys() {
        let v = Value::json_decode(r#"{"z": 1, "a": [true, null], "m": {"k": "v"}}"#).unwrap();
        assert_eq!(
            v.json_encode().unwrap(),
            r#"{"a":[true,null],"m":{"k":"v"},"z":1}"#
        );
    }

    #[test]
    fn json_encode_money_as_string() {
        let v = Value::Money(Decimal::from_str("100.50").unwrap());
        assert_eq!(v.json_encode().unwrap(), r#""100.50""#);
    }

    #[test]
    fn index_array_and_map() {
        let arr = Value::Array(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(arr.index(&Value::Int(1)).unwrap(), Value::Int(20));
        assert!(arr.index(&Value::Int(2)).is_err());
        assert!(arr.index(&Value::Int(-1)).is_err());

        let mut m = BTreeMap::new();
        m.insert("k".to_string(), Value::Str("v".into()));
        let map = Value::Map(m);
        assert_eq!(
            map.index(&Value::Str("k".into())).unwrap(),
            Value::Str("v".into())
        );
        assert_eq!(map.index(&Value::Str("nope".into())).unwrap(), Value::Null);
    }
}
