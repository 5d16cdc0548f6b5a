//! Scratch values: the closed set of shapes a session's key/value map holds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Error;

/// A value stored in a session's scratch map.
///
/// `null` has no representation so that a persisted map always reloads
/// to the exact same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScratchValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ScratchValue>),
    Record(BTreeMap<String, ScratchValue>),
}

impl TryFrom<serde_json::Value> for ScratchValue {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;
        match value {
            Value::Null => Err(Error::validation("scratch values cannot be null")),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| Error::validation(format!("number {n} is not representable"))),
            Value::String(s) => Ok(Self::String(s)),
            Value::Array(items) => items
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Self::try_from(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Record),
        }
    }
}

impl From<&ScratchValue> for serde_json::Value {
    fn from(value: &ScratchValue) -> Self {
        match value {
            ScratchValue::Bool(b) => serde_json::Value::Bool(*b),
            ScratchValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScratchValue::String(s) => serde_json::Value::String(s.clone()),
            ScratchValue::List(items) => {
                serde_json::Value::Array(items.iter().map(Into::into).collect())
            }
            ScratchValue::Record(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            ),
        }
    }
}

impl From<&str> for ScratchValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for ScratchValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ScratchValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
