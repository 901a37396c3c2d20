//! Carrying many-to-many associations across a clone.

use chrono::{DateTime, Utc};
use tracing::debug;

use vestige_core::models::{KEY_COLUMN, VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{ColumnRef, CompareOp, Predicate, Update};
use vestige_core::{QueryTime, Value, VersionKey, VersionRow, VestigeResult};

use crate::engine::{key_batches, VersionEngine, BASE_ALIAS};
use crate::mutation::insert_rows;

/// Re-home the join rows of `through` whose `column` names `identity` after
/// the object was split at `at` into the head and `historical`.
///
/// Closed join rows move to the historical key. Each open join row that was
/// already valid before `at` gets a closed copy ending at `at` pointing at the
/// historical key, and the open row itself restarts at `at`.
pub(crate) fn carry_forward(
    engine: &VersionEngine,
    through: &str,
    column: &str,
    identity: VersionKey,
    historical: VersionKey,
    at: DateTime<Utc>,
) -> VestigeResult<()> {
    let schema = engine.schema(through)?;
    let closed = engine.storage.update(&Update {
        table: through.to_string(),
        assignments: vec![(column.to_string(), Value::Key(historical))],
        filter: Predicate::all([
            Predicate::eq(ColumnRef::new(through, column), identity),
            Predicate::IsNotNull(ColumnRef::new(through, VALID_UNTIL_COLUMN)),
        ]),
    })?;

    let select = engine
        .base_select(&schema, None)?
        .filter(Predicate::eq(ColumnRef::new(BASE_ALIAS, column), identity))
        .filter(Predicate::temporal(BASE_ALIAS, QueryTime::Current))
        .filter(Predicate::compare(
            ColumnRef::new(BASE_ALIAS, VALID_FROM_COLUMN),
            CompareOp::Lt,
            at,
        ));
    let open = engine.fetch_rows(&schema, &select, QueryTime::Current, false)?;
    if open.is_empty() {
        debug!(through, column, closed, "no open associations to carry");
        return Ok(());
    }

    let mut copies = Vec::with_capacity(open.len());
    for row in &open {
        let (mut copy, _) = row.split_at(at, VersionKey::new())?;
        copy.set(column, historical);
        copies.push(copy);
    }
    for chunk in copies.chunks(engine.config.relation_batch_size) {
        let chunk: Vec<&VersionRow> = chunk.iter().collect();
        insert_rows(engine, &schema, &chunk)?;
    }

    let keys: Vec<VersionKey> = open.iter().map(VersionRow::key).collect();
    for values in key_batches(&keys, engine.config.relation_batch_size) {
        engine.storage.update(&Update {
            table: through.to_string(),
            assignments: vec![(VALID_FROM_COLUMN.to_string(), Value::Timestamp(at))],
            filter: Predicate::In {
                column: ColumnRef::new(through, KEY_COLUMN),
                values,
            },
        })?;
    }
    debug!(through, column, closed, carried = open.len(), "associations carried forward");
    Ok(())
}
