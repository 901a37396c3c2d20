//! Value codec between `vestige_core::Value` and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};

use vestige_core::config::IdentifierMode;
use vestige_core::errors::StorageError;
use vestige_core::models::format_timestamp;
use vestige_core::{Value, ValueKind};

/// Encode a value for binding. Timestamps become fixed-width RFC 3339 text so
/// that lexical comparison in SQL equals chronological comparison.
pub fn to_sql(value: &Value, mode: IdentifierMode) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(t) => SqlValue::Text(format_timestamp(t)),
        Value::Key(k) => match mode {
            IdentifierMode::Uuid => SqlValue::Blob(k.as_bytes().to_vec()),
            IdentifierMode::Text => SqlValue::Text(k.to_string()),
        },
    }
}

/// Decode a raw column into the declared kind.
pub fn from_sql(raw: ValueRef<'_>, kind: ValueKind, column: &str) -> Result<Value, StorageError> {
    let value = match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| StorageError::Decode {
                column: column.to_string(),
                reason: e.to_string(),
            })?;
            Value::Text(text.to_string())
        }
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    };
    value.decode(kind, column)
}

/// SQLite column type for a declared kind.
pub fn column_type(kind: ValueKind, mode: IdentifierMode) -> &'static str {
    match kind {
        ValueKind::Bool | ValueKind::Integer => "INTEGER",
        ValueKind::Real => "REAL",
        ValueKind::Text | ValueKind::Timestamp => "TEXT",
        ValueKind::Blob => "BLOB",
        ValueKind::Key => match mode {
            IdentifierMode::Uuid => "BLOB",
            IdentifierMode::Text => "TEXT",
        },
    }
}
