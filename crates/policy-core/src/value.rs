//! Tagged attribute value tree used by facts, context, and conditions.
//!
//! Values never coerce across tags: an `Int` is never compared equal to a same-valued
//! `Float`, and a `String` is never compared to a `Bool`. Every operator in `policy-eval`
//! dispatches on the tag explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A value resolved from a subject/resource/action/context attribute tree.
///
/// `Map` uses a `BTreeMap` (not `HashMap`) so that canonical serialization for the
/// compiler's checksum (§4.5/§6) is key-order-stable without an extra sort pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// `true` for any variant other than `Null` — used by `exists`/`not_exists`, which
    /// per §4.1 only treat "undefined" and `null` as absent.
    pub fn is_present(&self) -> bool {
        !matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a single key on a `Map` value; `None` (not `Some(Value::Null)`) for any
    /// other variant or a missing key, matching the "undefined" semantics of §4.1.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Convert from an arbitrary `serde_json::Value`, e.g. when a `FactsSource`
    /// implementation hands back JSON from a SQL row or HTTP response.
    pub fn from_json(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(a) => Value::List(a.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A simple, ergonomic attribute map: `map<string, value>` for subject/resource/context
/// attribute bags.
pub type AttributeMap = BTreeMap<String, Value>;
