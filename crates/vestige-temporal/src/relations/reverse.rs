use vestige_core::models::{IDENTITY_COLUMN, VALID_FROM_COLUMN};
use vestige_core::query::{ColumnRef, Predicate};
use vestige_core::{VersionRow, VestigeError, VestigeResult};

use super::relation_time;
use crate::engine::{VersionEngine, BASE_ALIAS};

/// Rows of the referencing entity whose reference holds `row`'s identity,
/// restricted to the row's query time.
pub fn referencing(
    engine: &VersionEngine,
    row: &VersionRow,
    name: &str,
) -> VestigeResult<Vec<VersionRow>> {
    let reverse = engine
        .catalog
        .reverse_reference(row.entity(), name)
        .ok_or_else(|| VestigeError::UnknownField {
            entity: row.entity().to_string(),
            field: name.to_string(),
        })?;
    let time = relation_time(row.query_time());
    let schema = reverse.entity;
    let select = engine
        .base_select(&schema, None)?
        .filter(Predicate::eq(
            ColumnRef::new(BASE_ALIAS, &reverse.reference.name),
            row.identity(),
        ))
        .filter(engine.temporal(&schema, BASE_ALIAS, time))
        .order(ColumnRef::new(BASE_ALIAS, VALID_FROM_COLUMN), false)
        .order(ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN), false);
    engine.fetch_rows(&schema, &select, time, false)
}
