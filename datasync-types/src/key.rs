//! Identifier types: reconciliation run ids and record correlation keys.

use crate::{Error, FieldMap, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one reconciliation call.
/// Uses UUID v7 so runs sort by start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new run ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The value of a record's pivot field, used to pair a source record with
/// its target counterpart.
///
/// Only scalar values can correlate records: strings, booleans and integral
/// numbers. Integers are normalised so that `1` read from one store matches
/// `1` read from another regardless of signedness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Text(String),
}

impl CorrelationKey {
    /// Reads the correlation key stored under `field` in a field map.
    pub fn from_fields(fields: &FieldMap, field: &str) -> Result<Self> {
        match fields.get(field) {
            Some(value) => Self::from_value(field, value),
            None => Err(Error::InvalidKey {
                field: field.to_string(),
                reason: "field is missing".into(),
            }),
        }
    }

    /// Converts a JSON value into a correlation key.
    /// `field` is only used to describe the failure.
    pub fn from_value(field: &str, value: &Value) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidKey {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::UInt(u))
                } else {
                    Err(invalid("non-integral numbers cannot correlate records"))
                }
            }
            Value::Null => Err(invalid("value is null")),
            Value::Array(_) => Err(invalid("arrays cannot correlate records")),
            Value::Object(_) => Err(invalid("objects cannot correlate records")),
        }
    }

    /// Converts the key back into the JSON value it was read from.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::UInt(u) => Value::from(*u),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for CorrelationKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CorrelationKey {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
