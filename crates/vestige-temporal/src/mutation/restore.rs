use std::collections::BTreeMap;

use tracing::info;

use vestige_core::models::KEY_COLUMN;
use vestige_core::query::{ColumnRef, Predicate, Update};
use vestige_core::{now, Value, VersionRow, VestigeError, VestigeResult};

use super::{check_attributes, insert_rows, terminate::terminate};
use crate::engine::VersionEngine;
use crate::relations::many_to_many;

/// Bring a terminated version back as the current version of its identity.
///
/// Overrides replace attribute and reference values. References without an
/// override are cleared, and a required one raises `ForeignKeyRequiresValue`.
/// Many-to-many associations and reverse references are not restored.
///
/// In one transaction: a current version, if any, is terminated now together
/// with its current associations; the head row gives up the head slot to a
/// fresh key (associations pointing at it follow); the restored row is
/// inserted under the identity key, valid from now.
pub fn restore(
    engine: &VersionEngine,
    row: &mut VersionRow,
    mut overrides: BTreeMap<String, Value>,
) -> VestigeResult<VersionRow> {
    let schema = engine.versioned_schema(row.entity(), "restore")?;
    if row.is_current() {
        return Err(VestigeError::InvalidState(format!(
            "{} {} is the current version; nothing to restore",
            row.entity(),
            row.identity()
        )));
    }
    if row.is_deferred() {
        return Err(VestigeError::InvalidState(format!(
            "{} {} was loaded with deferred attributes",
            row.entity(),
            row.identity()
        )));
    }

    let mut attributes = row.attributes().clone();
    for reference in schema.references() {
        match overrides.remove(&reference.name) {
            Some(value) if !value.is_null() => {
                attributes.insert(reference.name.clone(), value);
            }
            _ if reference.required => {
                return Err(VestigeError::ForeignKeyRequiresValue {
                    entity: schema.name().to_string(),
                    reference: reference.name.clone(),
                });
            }
            _ => {
                attributes.insert(reference.name.clone(), Value::Null);
            }
        }
    }
    attributes.extend(overrides);
    check_attributes(&schema, &attributes, true)?;

    let table = schema.name();
    let identity = row.identity();
    let original = row.clone();
    let result = engine.transaction(|| {
        let at = now();
        let mut head = engine
            .find_by_key(&schema, identity)?
            .ok_or_else(|| VestigeError::ObjectNotFound {
                entity: table.to_string(),
                detail: format!("no head row for identity {identity}"),
            })?;
        if head.is_current() {
            terminate(engine, &schema, &mut head, at)?;
            many_to_many::terminate_associations(engine, table, &[identity], at)?;
        }

        let released = head.release_head()?;
        if row.is_latest() {
            *row = head.clone().with_query_time(row.query_time());
        }
        engine.storage.update(&Update {
            table: table.to_string(),
            assignments: vec![(KEY_COLUMN.to_string(), Value::Key(released))],
            filter: Predicate::eq(ColumnRef::new(table, KEY_COLUMN), identity),
        })?;
        many_to_many::repoint_associations(engine, table, identity, released)?;

        let restored = row.restored(at, attributes)?;
        insert_rows(engine, &schema, &[&restored])?;
        Ok(restored)
    });

    match result {
        Ok(restored) => {
            info!(entity = table, identity = %identity, at = %restored.valid_from(), "restored");
            Ok(restored)
        }
        Err(e) => {
            *row = original;
            Err(e)
        }
    }
}
