//! Dynamically typed settings values
//!
//! A stored value is one of a small closed set of native kinds (string,
//! integer, float, boolean) or a serialized JSON blob for everything else.
//! Keeping primitives native lets file codecs write them without a
//! serialization round-trip; complex types go through serde.

use crate::error::StrataResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A value stored under a settings key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingsValue {
    /// UTF-8 text
    Text(String),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Anything that is not a native primitive, kept as its JSON representation
    Serialized(serde_json::Value),
}

impl SettingsValue {
    /// Short kind name, used in diagnostics and the XML codec
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Serialized(_) => "json",
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Map a JSON value onto the native kinds, falling back to `Serialized`
    /// for arrays, objects and null
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            other => Self::Serialized(other),
        }
    }

    /// The JSON representation of this value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Serialized(v) => v.clone(),
        }
    }

    /// Convert an arbitrary serializable value into a stored value
    pub fn from_typed<T: Serialize>(value: &T) -> StrataResult<Self> {
        Ok(Self::from_json(serde_json::to_value(value)?))
    }

    /// Convert the stored value into the requested type.
    ///
    /// Returns `None` when the value cannot represent `T`; a type mismatch
    /// is never an error. Text values are leniently coerced: a stored
    /// `"8080"` satisfies an integer read, `"true"` a boolean read, and a
    /// JSON document string satisfies a complex-type read (which is how
    /// string-only formats like INI round-trip complex values).
    pub fn to_typed<T: DeserializeOwned>(&self) -> Option<T> {
        if let Ok(v) = serde_json::from_value(self.to_json()) {
            return Some(v);
        }
        for candidate in self.coercion_candidates() {
            if let Ok(v) = serde_json::from_value(candidate) {
                return Some(v);
            }
        }
        None
    }

    /// Alternative JSON representations tried when the direct one does not
    /// deserialize into the requested type
    fn coercion_candidates(&self) -> Vec<serde_json::Value> {
        let mut candidates = Vec::new();
        match self {
            Self::Text(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    candidates.push(serde_json::Value::Number(i.into()));
                }
                if let Ok(f) = s.parse::<f64>() {
                    if let Some(n) = serde_json::Number::from_f64(f) {
                        candidates.push(serde_json::Value::Number(n));
                    }
                }
                if let Ok(b) = s.parse::<bool>() {
                    candidates.push(serde_json::Value::Bool(b));
                }
                // Last resort: the text may be a serialized JSON document.
                if let Ok(v) = serde_json::from_str::<serde_json::Value>(s) {
                    if v.is_array() || v.is_object() {
                        candidates.push(v);
                    }
                }
            }
            Self::Int(i) => candidates.push(serde_json::Value::String(i.to_string())),
            Self::Float(f) => candidates.push(serde_json::Value::String(f.to_string())),
            Self::Bool(b) => candidates.push(serde_json::Value::String(b.to_string())),
            Self::Serialized(_) => {}
        }
        candidates
    }
}

impl std::fmt::Display for SettingsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Serialized(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for SettingsValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SettingsValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SettingsValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for SettingsValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for SettingsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
