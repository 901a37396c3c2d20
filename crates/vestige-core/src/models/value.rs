//! Attribute values and declared column kinds.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{format_timestamp, normalize_timestamp, VersionKey};
use crate::errors::StorageError;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Integer,
    Real,
    Text,
    Blob,
    Timestamp,
    Key,
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Key(VersionKey),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Integer(_) => Some(ValueKind::Integer),
            Value::Real(_) => Some(ValueKind::Real),
            Value::Text(_) => Some(ValueKind::Text),
            Value::Blob(_) => Some(ValueKind::Blob),
            Value::Timestamp(_) => Some(ValueKind::Timestamp),
            Value::Key(_) => Some(ValueKind::Key),
        }
    }

    pub fn as_key(&self) -> Option<VersionKey> {
        match self {
            Value::Key(k) => Some(*k),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Whether this value may be stored in a column of `kind`.
    pub fn fits(&self, kind: ValueKind) -> bool {
        match (self, kind) {
            (Value::Null, _) => true,
            (Value::Integer(_), ValueKind::Real) => true,
            _ => self.kind() == Some(kind),
        }
    }

    /// Coerce a raw backend value into the declared kind of `column`.
    pub fn decode(self, kind: ValueKind, column: &str) -> Result<Value, StorageError> {
        let fail = |reason: String| StorageError::Decode {
            column: column.to_string(),
            reason,
        };
        match (self, kind) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Integer(i), ValueKind::Bool) => Ok(Value::Bool(i != 0)),
            (Value::Integer(i), ValueKind::Real) => Ok(Value::Real(i as f64)),
            (Value::Text(s), ValueKind::Timestamp) => DateTime::parse_from_rfc3339(&s)
                .map(|t| Value::Timestamp(normalize_timestamp(t.with_timezone(&Utc))))
                .map_err(|e| fail(format!("bad timestamp `{s}`: {e}"))),
            (Value::Text(s), ValueKind::Key) => VersionKey::parse(&s)
                .map(Value::Key)
                .map_err(|e| fail(e.to_string())),
            (Value::Blob(b), ValueKind::Key) => VersionKey::from_slice(&b)
                .map(Value::Key)
                .map_err(|e| fail(e.to_string())),
            (v, k) if v.kind() == Some(k) => Ok(v),
            (v, k) => Err(fail(format!("expected {k:?}, found {v:?}"))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(t) => write!(f, "{}", format_timestamp(t)),
            Value::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(normalize_timestamp(v))
    }
}

impl From<VersionKey> for Value {
    fn from(v: VersionKey) -> Self {
        Value::Key(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
