use vestige_core::{now, VersionRow, VestigeResult};

use crate::engine::VersionEngine;

/// An unsaved row with a fresh identity, born now, carrying the attribute
/// and to-one reference values of `row`. Many-to-many and reverse
/// relationships do not follow. Persist it with `save`. Rows loaded with
/// deferred attributes are refused.
pub fn detach(engine: &VersionEngine, row: &VersionRow) -> VestigeResult<VersionRow> {
    engine.schema(row.entity())?;
    row.detached(now())
}
