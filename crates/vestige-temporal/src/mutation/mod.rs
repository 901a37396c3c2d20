//! Clone-on-write mutation protocol: create, save, clone, terminate,
//! restore and detach.

pub mod clone;
pub mod create;
pub mod detach;
pub mod restore;
pub mod save;
pub mod terminate;

use std::collections::BTreeMap;

use vestige_core::query::Insert;
use vestige_core::schema::EntitySchema;
use vestige_core::{Value, ValueKind, VersionRow, VestigeError, VestigeResult};

use crate::decode::row_values;
use crate::engine::VersionEngine;

/// Check names and kinds of data values. With `complete`, every required
/// attribute and reference must carry a non-null value.
pub(crate) fn check_attributes(
    schema: &EntitySchema,
    attributes: &BTreeMap<String, Value>,
    complete: bool,
) -> VestigeResult<()> {
    for (name, value) in attributes {
        let kind = data_kind(schema, name)?;
        if !value.fits(kind) {
            return Err(VestigeError::InvalidArgument(format!(
                "{}.{name} expects {kind:?}, got {value}",
                schema.name()
            )));
        }
    }
    if complete {
        let required = schema
            .attributes()
            .iter()
            .filter(|a| a.required)
            .map(|a| &a.name)
            .chain(
                schema
                    .references()
                    .iter()
                    .filter(|r| r.required)
                    .map(|r| &r.name),
            );
        for name in required {
            if attributes.get(name).map_or(true, Value::is_null) {
                return Err(VestigeError::InvalidArgument(format!(
                    "{}.{name} is required",
                    schema.name()
                )));
            }
        }
    }
    Ok(())
}

fn data_kind(schema: &EntitySchema, name: &str) -> VestigeResult<ValueKind> {
    if let Some(attribute) = schema.find_attribute(name) {
        return Ok(attribute.kind);
    }
    if schema.find_reference(name).is_some() {
        return Ok(ValueKind::Key);
    }
    Err(VestigeError::UnknownField {
        entity: schema.name().to_string(),
        field: name.to_string(),
    })
}

/// Missing optional data columns become explicit nulls.
pub(crate) fn fill_optional(schema: &EntitySchema, attributes: &mut BTreeMap<String, Value>) {
    for (name, _) in schema.data_columns() {
        attributes.entry(name.to_string()).or_insert(Value::Null);
    }
}

pub(crate) fn insert_rows(
    engine: &VersionEngine,
    schema: &EntitySchema,
    rows: &[&VersionRow],
) -> VestigeResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let columns = schema.columns();
    let values = rows.iter().map(|row| row_values(row, &columns)).collect();
    engine.storage.insert(&Insert {
        table: schema.name().to_string(),
        columns,
        rows: values,
    })
}
