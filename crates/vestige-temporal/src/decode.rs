//! Projection of entity columns and decoding of records into version rows.

use vestige_core::errors::StorageError;
use vestige_core::models::{
    RowParts, BORN_AT_COLUMN, IDENTITY_COLUMN, KEY_COLUMN, VALID_FROM_COLUMN,
    VALID_UNTIL_COLUMN, VERSION_COLUMNS,
};
use vestige_core::query::{ColumnRef, SelectColumn};
use vestige_core::schema::EntitySchema;
use vestige_core::traits::Record;
use vestige_core::{QueryTime, Value, ValueKind, VersionKey, VersionRow, VestigeError, VestigeResult};

/// Bookkeeping columns plus either every data column or only `only`.
pub fn select_columns(
    schema: &EntitySchema,
    alias: &str,
    only: Option<&[String]>,
) -> VestigeResult<Vec<SelectColumn>> {
    let mut columns: Vec<SelectColumn> = VERSION_COLUMNS
        .iter()
        .map(|name| column(schema, alias, name))
        .collect::<VestigeResult<_>>()?;
    match only {
        None => {
            for (name, kind) in schema.data_columns() {
                columns.push(SelectColumn {
                    column: ColumnRef::new(alias, name),
                    kind,
                    label: name.to_string(),
                });
            }
        }
        Some(names) => {
            for name in names {
                if VERSION_COLUMNS.contains(&name.as_str()) {
                    continue;
                }
                columns.push(column(schema, alias, name)?);
            }
        }
    }
    Ok(columns)
}

fn column(schema: &EntitySchema, alias: &str, name: &str) -> VestigeResult<SelectColumn> {
    let kind = schema
        .column_kind(name)
        .ok_or_else(|| VestigeError::UnknownField {
            entity: schema.name().to_string(),
            field: name.to_string(),
        })?;
    Ok(SelectColumn {
        column: ColumnRef::new(alias, name),
        kind,
        label: name.to_string(),
    })
}

/// Decode a record selected with [`select_columns`].
pub fn row_from_record(
    schema: &EntitySchema,
    mut record: Record,
    deferred: bool,
    time: QueryTime,
) -> VestigeResult<VersionRow> {
    let key = take_key(&mut record, KEY_COLUMN)?;
    let identity = take_key(&mut record, IDENTITY_COLUMN)?;
    let valid_from = take_timestamp(&mut record, VALID_FROM_COLUMN)?
        .ok_or_else(|| missing(VALID_FROM_COLUMN))?;
    let valid_until = take_timestamp(&mut record, VALID_UNTIL_COLUMN)?;
    let born_at =
        take_timestamp(&mut record, BORN_AT_COLUMN)?.ok_or_else(|| missing(BORN_AT_COLUMN))?;
    let row = VersionRow::from_parts(RowParts {
        entity: schema.name().to_string(),
        key,
        identity,
        valid_from,
        valid_until,
        born_at,
        attributes: record,
        deferred,
    })?;
    Ok(row.with_query_time(time))
}

fn missing(column: &str) -> VestigeError {
    StorageError::Decode {
        column: column.to_string(),
        reason: "missing value".to_string(),
    }
    .into()
}

fn take_key(record: &mut Record, column: &str) -> VestigeResult<VersionKey> {
    match record.remove(column) {
        Some(Value::Key(key)) => Ok(key),
        Some(other) => Err(StorageError::Decode {
            column: column.to_string(),
            reason: format!("expected {:?}, found {other:?}", ValueKind::Key),
        }
        .into()),
        None => Err(missing(column)),
    }
}

fn take_timestamp(
    record: &mut Record,
    column: &str,
) -> VestigeResult<Option<chrono::DateTime<chrono::Utc>>> {
    match record.remove(column) {
        Some(Value::Timestamp(t)) => Ok(Some(t)),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(StorageError::Decode {
            column: column.to_string(),
            reason: format!("expected {:?}, found {other:?}", ValueKind::Timestamp),
        }
        .into()),
    }
}

/// Values of a row's bookkeeping and data columns, in `columns` order.
pub fn row_values(row: &VersionRow, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| match column.as_str() {
            KEY_COLUMN => Value::Key(row.key()),
            IDENTITY_COLUMN => Value::Key(row.identity()),
            VALID_FROM_COLUMN => Value::Timestamp(row.valid_from()),
            VALID_UNTIL_COLUMN => row.valid_until().into(),
            BORN_AT_COLUMN => Value::Timestamp(row.born_at()),
            other => row.get(other).cloned().unwrap_or(Value::Null),
        })
        .collect()
}
