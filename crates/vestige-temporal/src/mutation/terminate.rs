use chrono::{DateTime, Utc};
use tracing::debug;

use vestige_core::models::{KEY_COLUMN, VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{ColumnRef, Predicate, Update};
use vestige_core::schema::EntitySchema;
use vestige_core::{normalize_timestamp, Value, VersionRow, VestigeError, VestigeResult};

use crate::engine::VersionEngine;

/// Close a current row at `at`.
///
/// The write is a compare-and-swap on `valid_until IS NULL` and the version
/// start: a row terminated or superseded since it was read yields
/// `AlreadyTerminated`.
pub fn terminate(
    engine: &VersionEngine,
    schema: &EntitySchema,
    row: &mut VersionRow,
    at: DateTime<Utc>,
) -> VestigeResult<()> {
    let at = normalize_timestamp(at);
    let mut closed = row.clone();
    closed.terminate_at(at)?;

    let table = schema.name();
    let updated = engine.storage.update(&Update {
        table: table.to_string(),
        assignments: vec![(VALID_UNTIL_COLUMN.to_string(), Value::Timestamp(at))],
        filter: Predicate::all([
            Predicate::eq(ColumnRef::new(table, KEY_COLUMN), row.key()),
            Predicate::IsNull(ColumnRef::new(table, VALID_UNTIL_COLUMN)),
            Predicate::eq(ColumnRef::new(table, VALID_FROM_COLUMN), row.valid_from()),
        ]),
    })?;
    if updated == 0 {
        return Err(VestigeError::AlreadyTerminated {
            entity: table.to_string(),
            key: row.key().to_string(),
        });
    }
    debug!(entity = table, identity = %row.identity(), at = %at, "terminated");
    *row = closed;
    Ok(())
}
