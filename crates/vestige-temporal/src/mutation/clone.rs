use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use vestige_core::models::{KEY_COLUMN, VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{ColumnRef, Predicate, Update};
use vestige_core::{
    normalize_timestamp, now, Value, VersionKey, VersionRow, VestigeError, VestigeResult,
};

use super::{insert_rows, save::save};
use crate::engine::VersionEngine;
use crate::relations::relation_clone;

/// Split the current row at `at` (default now).
///
/// In one transaction the stored row moves to a fresh surrogate key and is
/// closed at `at`, the next version is inserted under the head key, and every
/// many-to-many association of the object is carried forward. On success
/// `row` describes the historical version and the next version is returned.
pub fn clone_at(
    engine: &VersionEngine,
    row: &mut VersionRow,
    at: Option<DateTime<Utc>>,
) -> VestigeResult<VersionRow> {
    let schema = engine.versioned_schema(row.entity(), "clone")?;
    let now = now();
    let at = at.map(normalize_timestamp).unwrap_or(now);
    if at > now {
        return Err(VestigeError::InvalidState(format!(
            "clone time {at} is later than now"
        )));
    }
    let fresh = VersionKey::new();
    let (historical, next) = row.split_at(at, fresh)?;
    let table = schema.name();
    let identity = row.identity();

    engine.transaction(|| {
        let moved = engine.storage.update(&Update {
            table: table.to_string(),
            assignments: vec![
                (KEY_COLUMN.to_string(), Value::Key(fresh)),
                (VALID_UNTIL_COLUMN.to_string(), Value::Timestamp(at)),
            ],
            filter: Predicate::all([
                Predicate::eq(ColumnRef::new(table, KEY_COLUMN), row.key()),
                Predicate::IsNull(ColumnRef::new(table, VALID_UNTIL_COLUMN)),
                Predicate::eq(ColumnRef::new(table, VALID_FROM_COLUMN), row.valid_from()),
            ]),
        })?;
        if moved == 0 {
            return Err(VestigeError::AlreadyTerminated {
                entity: table.to_string(),
                key: row.key().to_string(),
            });
        }
        insert_rows(engine, &schema, &[&next])?;
        for (through, column) in engine.catalog.join_columns(table) {
            relation_clone::carry_forward(engine, &through, &column, identity, fresh, at)?;
        }
        Ok(())
    })?;

    info!(entity = table, identity = %identity, at = %at, "cloned");
    *row = historical;
    Ok(next)
}

/// Clone now, apply `changes` to the new version and save it.
pub fn revise(
    engine: &VersionEngine,
    row: &mut VersionRow,
    changes: BTreeMap<String, Value>,
) -> VestigeResult<VersionRow> {
    let original = row.clone();
    let result = engine.transaction(|| {
        let mut next = clone_at(engine, row, None)?;
        for (name, value) in changes {
            next.set(name, value);
        }
        save(engine, &mut next)?;
        Ok(next)
    });
    if result.is_err() {
        *row = original;
    } else {
        debug!(entity = row.entity(), identity = %row.identity(), "revised");
    }
    result
}
