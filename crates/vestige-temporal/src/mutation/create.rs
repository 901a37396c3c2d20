use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use vestige_core::{normalize_timestamp, now, Value, VersionKey, VersionRow, VestigeResult};

use super::{check_attributes, fill_optional, insert_rows};
use crate::engine::VersionEngine;

/// Insert a new head row: `key == identity`, born and valid from `at`.
pub fn create(
    engine: &VersionEngine,
    entity: &str,
    key: Option<VersionKey>,
    at: Option<DateTime<Utc>>,
    mut attributes: BTreeMap<String, Value>,
) -> VestigeResult<VersionRow> {
    let schema = engine.schema(entity)?;
    check_attributes(&schema, &attributes, true)?;
    fill_optional(&schema, &mut attributes);

    let at = at.map(normalize_timestamp).unwrap_or_else(now);
    let row = VersionRow::new_head(entity, key.unwrap_or_default(), at, attributes);
    insert_rows(engine, &schema, &[&row])?;
    debug!(entity, identity = %row.identity(), at = %row.valid_from(), "created");
    Ok(row)
}
