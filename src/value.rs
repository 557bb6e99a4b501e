use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::{Decimal, prelude::FromPrimitive};

/// A JSON value as stored in a metadata document.
///
/// This type represents all valid JSON types with a distinction between
/// integers and floats (unlike standard JSON which only has "number").
/// Metadata attribute values, query constants, and dataset documents all
/// use this representation.
///
/// # Examples
///
/// ```
/// use mql_lang::Value;
/// use std::collections::HashMap;
///
/// let size = Value::Integer(1500);
/// let tags = Value::Array(vec![Value::String("raw".to_string())]);
///
/// let mut meta = HashMap::new();
/// meta.insert("run.number".to_string(), Value::Integer(3129));
/// let doc = Value::Object(meta);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null
    Null,

    /// JSON boolean (true/false)
    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),

    /// Array of values
    Array(Vec<Value>),

    /// Object with string keys
    Object(HashMap<String, Value>),
}

/// A metadata document: attribute name to value.
pub type Metadata = HashMap<String, Value>;

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Ordering between two values, `None` when they are not comparable.
    ///
    /// Integers and floats compare numerically with each other; the mixed
    /// case goes through `Decimal` so that e.g. `Integer(1) == Float(1.0)`
    /// holds exactly. Strings compare lexicographically, booleans as
    /// `false < true`. Values of different JSON kinds do not compare.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => {
                let ad = Decimal::from_i64(*a)?;
                let bd = Decimal::from_f64(*b)?;
                Some(ad.cmp(&bd))
            }
            (Value::Float(a), Value::Integer(b)) => {
                let ad = Decimal::from_f64(*a)?;
                let bd = Decimal::from_i64(*b)?;
                Some(ad.cmp(&bd))
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality under the same numeric widening rules as [`Value::compare`].
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Parse a metadata document from JSON object text.
///
/// A non-object top level is wrapped under a `"value"` key so the caller
/// always gets a map.
pub fn metadata_from_json(text: &str) -> Result<Metadata, serde_json::Error> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    match Value::from_json(&json) {
        Value::Object(map) => Ok(map),
        other => Ok(HashMap::from([("value".to_string(), other)])),
    }
}
