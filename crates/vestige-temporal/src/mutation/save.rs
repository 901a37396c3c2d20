use tracing::debug;

use vestige_core::models::{BORN_AT_COLUMN, KEY_COLUMN, VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{ColumnRef, Predicate, Update};
use vestige_core::{Value, VersionRow, VestigeError, VestigeResult};

use super::{check_attributes, insert_rows};
use crate::engine::VersionEngine;

/// Persist `row`: update the stored current row in place, or insert it when
/// no row with its key exists (new or detached rows). Historical versions
/// are immutable.
///
/// A row that was never cloned may have been moved in time with
/// [`VersionRow::at`]; saving it moves the stored interval start too.
pub fn save(engine: &VersionEngine, row: &mut VersionRow) -> VestigeResult<()> {
    let schema = engine.schema(row.entity())?;
    if row.is_terminated() {
        return Err(VestigeError::InvalidState(format!(
            "version {} of {} is historical and cannot be saved",
            row.key(),
            row.entity()
        )));
    }
    check_attributes(&schema, row.attributes(), false)?;

    match engine.find_by_key(&schema, row.key())? {
        Some(stored) => {
            if stored.is_terminated() {
                return Err(VestigeError::InvalidState(format!(
                    "version {} of {} was terminated in storage",
                    row.key(),
                    row.entity()
                )));
            }
            let relocated = stored.valid_from() != row.valid_from();
            if relocated && !(never_cloned(&stored) && never_cloned(row)) {
                return Err(VestigeError::InvalidState(format!(
                    "version {} of {} is stale; a newer version holds its key",
                    row.key(),
                    row.entity()
                )));
            }
            let mut assignments: Vec<_> = row
                .attributes()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            if relocated {
                assignments.extend([
                    (VALID_FROM_COLUMN.to_string(), Value::Timestamp(row.valid_from())),
                    (BORN_AT_COLUMN.to_string(), Value::Timestamp(row.born_at())),
                ]);
            }
            if assignments.is_empty() {
                return Ok(());
            }
            let table = schema.name();
            let updated = engine.storage.update(&Update {
                table: table.to_string(),
                assignments,
                filter: Predicate::all([
                    Predicate::eq(ColumnRef::new(table, KEY_COLUMN), row.key()),
                    Predicate::IsNull(ColumnRef::new(table, VALID_UNTIL_COLUMN)),
                    Predicate::eq(ColumnRef::new(table, VALID_FROM_COLUMN), stored.valid_from()),
                ]),
            })?;
            if updated == 0 {
                return Err(VestigeError::AlreadyTerminated {
                    entity: table.to_string(),
                    key: row.key().to_string(),
                });
            }
            debug!(entity = table, key = %row.key(), relocated, "updated in place");
        }
        None => {
            if row.is_deferred() {
                return Err(VestigeError::InvalidState(format!(
                    "{} {} has deferred attributes and cannot be inserted",
                    row.entity(),
                    row.key()
                )));
            }
            check_attributes(&schema, row.attributes(), true)?;
            for (name, _) in schema.data_columns() {
                if row.get(name).is_none() {
                    row.set(name, vestige_core::Value::Null);
                }
            }
            insert_rows(engine, &schema, &[&*row])?;
            debug!(entity = schema.name(), key = %row.key(), "inserted");
        }
    }
    Ok(())
}

fn never_cloned(row: &VersionRow) -> bool {
    row.born_at() == row.valid_from() && row.is_latest()
}
