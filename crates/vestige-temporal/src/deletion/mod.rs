//! Cascading soft delete.
//!
//! Versioned rows are terminated, never removed; plain rows are removed.
//! The collector plans the whole cascade first, so a protected reference
//! aborts the delete before any write.

mod collector;
mod hooks;

pub use hooks::{CollectorRegistry, DefaultCollectorHooks, ICollectorHooks, DEFAULT_COLLECTOR};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;

use vestige_core::models::KEY_COLUMN;
use vestige_core::query::{ColumnRef, Delete, Predicate, Update};
use vestige_core::{normalize_timestamp, VersionKey, VersionRow, VestigeError, VestigeResult};

use crate::engine::VersionEngine;
use crate::mutation::{clone::clone_at, save::save};
use crate::relations::many_to_many;

use collector::Collector;

/// Delete `roots` at `at` together with everything that cascades from them.
/// Returns the number of rows terminated or removed.
pub(crate) fn delete_rows(
    engine: &VersionEngine,
    roots: Vec<VersionRow>,
    at: DateTime<Utc>,
) -> VestigeResult<usize> {
    let at = normalize_timestamp(at);
    for root in &roots {
        let schema = engine.schema(root.entity())?;
        if schema.is_versioned() && !root.is_current() {
            return Err(VestigeError::AlreadyTerminated {
                entity: root.entity().to_string(),
                key: root.key().to_string(),
            });
        }
    }
    if roots.is_empty() {
        return Ok(0);
    }
    let hooks = engine.hooks()?;

    engine.transaction(|| {
        let plan = Collector::new(engine).collect(roots)?;

        for row in &plan.deletes {
            if !engine.schema(row.entity())?.is_auto_created() {
                hooks.pre_delete(row, at)?;
            }
        }

        for (mut referrer, changes) in plan.updates.into_values() {
            let schema = engine.schema(referrer.entity())?;
            if schema.is_versioned() {
                let mut next = clone_at(engine, &mut referrer, Some(at))?;
                for change in changes {
                    next.set(change.reference, change.value);
                }
                save(engine, &mut next)?;
            } else {
                let table = schema.name();
                engine.storage.update(&Update {
                    table: table.to_string(),
                    assignments: changes
                        .into_iter()
                        .map(|change| (change.reference, change.value))
                        .collect(),
                    filter: Predicate::eq(ColumnRef::new(table, KEY_COLUMN), referrer.key()),
                })?;
            }
        }

        let mut identities: BTreeMap<&str, Vec<VersionKey>> = BTreeMap::new();
        for row in &plan.deletes {
            identities.entry(row.entity()).or_default().push(row.identity());
        }
        for (entity, identities) in &identities {
            if engine.schema(entity)?.is_versioned() {
                many_to_many::terminate_associations(engine, entity, identities, at)?;
            }
        }

        let mut deleted = Vec::with_capacity(plan.deletes.len());
        for mut row in plan.deletes {
            let schema = engine.schema(row.entity())?;
            if schema.is_versioned() {
                hooks.terminate(engine, &mut row, at)?;
            } else {
                let table = schema.name();
                engine.storage.delete(&Delete {
                    table: table.to_string(),
                    filter: Predicate::eq(ColumnRef::new(table, KEY_COLUMN), row.key()),
                })?;
            }
            deleted.push(row);
        }

        for row in &deleted {
            if !engine.schema(row.entity())?.is_auto_created() {
                hooks.post_delete(row, at)?;
            }
        }
        info!(deleted = deleted.len(), at = %at, "soft delete complete");
        Ok(deleted.len())
    })
}
