use vestige_core::models::IDENTITY_COLUMN;
use vestige_core::query::{ColumnRef, Predicate};
use vestige_core::{Value, VersionRow, VestigeError, VestigeResult};

use super::relation_time;
use crate::engine::{VersionEngine, BASE_ALIAS};

/// The version of the referenced object valid at the row's query time.
///
/// A prefetched target is reused when it satisfies that time; otherwise one
/// query runs. `None` for a null reference; `ObjectNotFound` when the target
/// has no version at that time (a dangling `NoAction` reference).
pub fn resolve(
    engine: &VersionEngine,
    row: &VersionRow,
    name: &str,
) -> VestigeResult<Option<VersionRow>> {
    let schema = engine.schema(row.entity())?;
    let reference = schema
        .find_reference(name)
        .ok_or_else(|| VestigeError::UnknownField {
            entity: schema.name().to_string(),
            field: name.to_string(),
        })?;
    let identity = match row.get(name) {
        None if row.is_deferred() => {
            return Err(VestigeError::InvalidState(format!(
                "{}.{name} was not loaded",
                row.entity()
            )))
        }
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Key(key)) => *key,
        Some(other) => {
            return Err(VestigeError::InvalidState(format!(
                "{}.{name} holds {other}, not an identity",
                row.entity()
            )))
        }
    };

    let time = relation_time(row.query_time());
    if let Some(cached) = row.cached_related(name) {
        if cached.identity() == identity && time.matches(cached) {
            return Ok(Some(cached.clone().with_query_time(time)));
        }
    }

    let target = engine.schema(&reference.target)?;
    let select = engine
        .base_select(&target, None)?
        .filter(Predicate::eq(
            ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
            identity,
        ))
        .filter(engine.temporal(&target, BASE_ALIAS, time))
        .limit(2);
    let mut rows = engine.fetch_rows(&target, &select, time, false)?;
    match rows.len() {
        0 => Err(VestigeError::ObjectNotFound {
            entity: target.name().to_string(),
            detail: format!("identity {identity} has no version at {time:?}"),
        }),
        1 => Ok(rows.pop()),
        _ => Err(VestigeError::AmbiguousVersion {
            entity: target.name().to_string(),
            detail: format!("identity {identity} has several versions at {time:?}"),
        }),
    }
}
