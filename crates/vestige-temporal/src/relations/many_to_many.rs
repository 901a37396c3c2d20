//! Many-to-many associations stored as versioned join rows.
//!
//! A current join row points at the identities (head keys) of both
//! participants; historical join rows point at the surrogate keys of the
//! participant versions valid during their interval. Adding inserts a join
//! row, removing terminates it; nothing is ever deleted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use vestige_core::models::{IDENTITY_COLUMN, KEY_COLUMN, VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{ColumnRef, CompareOp, Join, JoinKind, Predicate, Projection, Select, Update};
use vestige_core::schema::RelationEnd;
use vestige_core::{
    normalize_timestamp, now, QueryTime, Value, VersionKey, VersionRow, VestigeError,
    VestigeResult,
};

use super::relation_time;
use crate::engine::{key_batches, VersionEngine, BASE_ALIAS};
use crate::mutation::insert_rows;

const FAR_ALIAS: &str = "t1";
const THROUGH_ALIAS: &str = "j1";
const NEAR_ALIAS: &str = "t2";

fn relation_end(engine: &VersionEngine, entity: &str, name: &str) -> VestigeResult<RelationEnd> {
    engine
        .catalog
        .relation_end(entity, name)
        .ok_or_else(|| VestigeError::UnknownField {
            entity: entity.to_string(),
            field: name.to_string(),
        })
}

/// Far-side rows joined through the association table to the near object.
///
/// Join rows may point at any version of either participant, so both ends
/// are matched by identity; only the join rows and the returned far versions
/// are restricted to `time`.
fn related_select(
    engine: &VersionEngine,
    end: &RelationEnd,
    near_entity: &str,
    identity: VersionKey,
    time: QueryTime,
) -> VestigeResult<Select> {
    let far = engine.schema(&end.far_entity)?;
    let mut select = engine
        .base_select(&far, None)?
        .join(Join {
            kind: JoinKind::Inner,
            table: end.far_entity.clone(),
            alias: FAR_ALIAS.to_string(),
            on: Predicate::ColumnEq {
                left: ColumnRef::new(FAR_ALIAS, IDENTITY_COLUMN),
                right: ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
            },
        })
        .join(Join {
            kind: JoinKind::Inner,
            table: end.through.clone(),
            alias: THROUGH_ALIAS.to_string(),
            on: Predicate::all([
                Predicate::ColumnEq {
                    left: ColumnRef::new(THROUGH_ALIAS, &end.far_column),
                    right: ColumnRef::new(FAR_ALIAS, KEY_COLUMN),
                },
                Predicate::temporal(THROUGH_ALIAS, time),
            ]),
        })
        .join(Join {
            kind: JoinKind::Inner,
            table: near_entity.to_string(),
            alias: NEAR_ALIAS.to_string(),
            on: Predicate::ColumnEq {
                left: ColumnRef::new(NEAR_ALIAS, KEY_COLUMN),
                right: ColumnRef::new(THROUGH_ALIAS, &end.near_column),
            },
        })
        .filter(Predicate::eq(
            ColumnRef::new(NEAR_ALIAS, IDENTITY_COLUMN),
            identity,
        ))
        .filter(Predicate::temporal(BASE_ALIAS, time));
    select.distinct = true;
    Ok(select)
}

/// Targets associated with `row` at its query time.
pub fn related(
    engine: &VersionEngine,
    row: &VersionRow,
    name: &str,
) -> VestigeResult<Vec<VersionRow>> {
    let end = relation_end(engine, row.entity(), name)?;
    let time = relation_time(row.query_time());
    let far = engine.schema(&end.far_entity)?;
    let select = related_select(engine, &end, row.entity(), row.identity(), time)?
        .order(ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN), false);
    engine.fetch_rows(&far, &select, time, false)
}

pub fn relation_count(engine: &VersionEngine, row: &VersionRow, name: &str) -> VestigeResult<u64> {
    let end = relation_end(engine, row.entity(), name)?;
    let time = relation_time(row.query_time());
    let select = related_select(engine, &end, row.entity(), row.identity(), time)?
        .project(Projection::CountDistinct(ColumnRef::new(
            BASE_ALIAS,
            IDENTITY_COLUMN,
        )));
    engine.storage.count(&select)
}

fn check_owner(row: &VersionRow, name: &str) -> VestigeResult<()> {
    if !row.is_current() {
        return Err(VestigeError::InvalidState(format!(
            "{}.{name} can only change on the current version",
            row.entity()
        )));
    }
    Ok(())
}

fn check_targets(end: &RelationEnd, targets: &[&VersionRow]) -> VestigeResult<()> {
    for target in targets {
        if target.entity() != end.far_entity {
            return Err(VestigeError::InvalidArgument(format!(
                "{} cannot be associated through {}.{}",
                target.entity(),
                end.owner,
                end.relation
            )));
        }
        if !target.is_current() {
            return Err(VestigeError::InvalidState(format!(
                "version {} of {} is historical and cannot be associated",
                target.key(),
                target.entity()
            )));
        }
    }
    Ok(())
}

/// Current `(near, far)` identity pairs among `nears` × `fars`.
fn current_pairs(
    engine: &VersionEngine,
    end: &RelationEnd,
    nears: &[VersionKey],
    fars: &[VersionKey],
) -> VestigeResult<BTreeSet<(VersionKey, VersionKey)>> {
    let through = engine.schema(&end.through)?;
    let batch = engine.config.relation_batch_size;
    let mut pairs = BTreeSet::new();
    for near_values in key_batches(nears, batch) {
        for far_values in key_batches(fars, batch) {
            let select = engine
                .base_select(&through, None)?
                .filter(Predicate::In {
                    column: ColumnRef::new(BASE_ALIAS, &end.near_column),
                    values: near_values.clone(),
                })
                .filter(Predicate::In {
                    column: ColumnRef::new(BASE_ALIAS, &end.far_column),
                    values: far_values,
                })
                .filter(Predicate::temporal(BASE_ALIAS, QueryTime::Current));
            let rows = engine.fetch_rows(&through, &select, QueryTime::Current, false)?;
            pairs.extend(rows.iter().filter_map(|row| {
                let near = row.get(&end.near_column)?.as_key()?;
                let far = row.get(&end.far_column)?.as_key()?;
                Some((near, far))
            }));
        }
    }
    Ok(pairs)
}

/// Associate `targets` with `row` from `at`. Pairs already associated are
/// left alone. Returns the number of join rows inserted.
pub fn add_at(
    engine: &VersionEngine,
    row: &VersionRow,
    name: &str,
    targets: &[&VersionRow],
    at: DateTime<Utc>,
) -> VestigeResult<usize> {
    let end = relation_end(engine, row.entity(), name)?;
    check_owner(row, name)?;
    check_targets(&end, targets)?;
    let at = normalize_timestamp(at);
    if at < row.valid_from() {
        return Err(VestigeError::InvalidState(format!(
            "association time {at} precedes the version start {}",
            row.valid_from()
        )));
    }
    let owner = row.identity();
    let mut wanted: BTreeSet<(VersionKey, VersionKey)> =
        targets.iter().map(|t| (owner, t.identity())).collect();
    if end.symmetrical {
        let mirrored: Vec<_> = wanted.iter().map(|&(a, b)| (b, a)).collect();
        wanted.extend(mirrored);
    }
    if wanted.is_empty() {
        return Ok(0);
    }

    let through = engine.schema(&end.through)?;
    engine.transaction(|| {
        let nears: Vec<VersionKey> = wanted
            .iter()
            .map(|(n, _)| *n)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let fars: Vec<VersionKey> = wanted
            .iter()
            .map(|(_, f)| *f)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing = current_pairs(engine, &end, &nears, &fars)?;
        let rows: Vec<VersionRow> = wanted
            .difference(&existing)
            .map(|&(near, far)| {
                let attributes = BTreeMap::from([
                    (end.near_column.clone(), Value::Key(near)),
                    (end.far_column.clone(), Value::Key(far)),
                ]);
                VersionRow::new_head(end.through.clone(), VersionKey::new(), at, attributes)
            })
            .collect();
        for chunk in rows.chunks(engine.config.relation_batch_size) {
            let chunk: Vec<&VersionRow> = chunk.iter().collect();
            insert_rows(engine, &through, &chunk)?;
        }
        debug!(relation = %end.relation, owner = %owner, added = rows.len(), "associated");
        Ok(rows.len())
    })
}

/// Terminate the current associations of `row` with `targets` at `at`.
/// Returns the number of join rows terminated.
pub fn remove_at(
    engine: &VersionEngine,
    row: &VersionRow,
    name: &str,
    targets: &[&VersionRow],
    at: DateTime<Utc>,
) -> VestigeResult<usize> {
    let end = relation_end(engine, row.entity(), name)?;
    check_owner(row, name)?;
    let identities: Vec<VersionKey> = targets.iter().map(|t| t.identity()).collect();
    let at = normalize_timestamp(at);
    engine.transaction(|| remove_identities(engine, &end, row.identity(), &identities, at))
}

fn remove_identities(
    engine: &VersionEngine,
    end: &RelationEnd,
    owner: VersionKey,
    targets: &[VersionKey],
    at: DateTime<Utc>,
) -> VestigeResult<usize> {
    if targets.is_empty() {
        return Ok(0);
    }
    let mut removed = 0;
    for keys in key_batches(targets, engine.config.relation_batch_size) {
        removed += terminate_where(
            engine,
            &end.through,
            Predicate::all([
                Predicate::eq(ColumnRef::new(&end.through, &end.near_column), owner),
                Predicate::In {
                    column: ColumnRef::new(&end.through, &end.far_column),
                    values: keys.clone(),
                },
            ]),
            at,
        )?;
        if end.symmetrical {
            terminate_where(
                engine,
                &end.through,
                Predicate::all([
                    Predicate::In {
                        column: ColumnRef::new(&end.through, &end.near_column),
                        values: keys,
                    },
                    Predicate::eq(ColumnRef::new(&end.through, &end.far_column), owner),
                ]),
                at,
            )?;
        }
    }
    debug!(relation = %end.relation, owner = %owner, removed, "dissociated");
    Ok(removed)
}

/// Close current join rows matching `filter` that were already valid at `at`.
fn terminate_where(
    engine: &VersionEngine,
    through: &str,
    filter: Predicate,
    at: DateTime<Utc>,
) -> VestigeResult<usize> {
    engine.storage.update(&Update {
        table: through.to_string(),
        assignments: vec![(VALID_UNTIL_COLUMN.to_string(), Value::Timestamp(at))],
        filter: Predicate::all([
            filter,
            Predicate::IsNull(ColumnRef::new(through, VALID_UNTIL_COLUMN)),
            Predicate::compare(
                ColumnRef::new(through, VALID_FROM_COLUMN),
                CompareOp::Lte,
                at,
            ),
        ]),
    })
}

/// Make `targets` the current association set: remove what is no longer
/// wanted and add what is missing, at one instant.
pub fn assign(
    engine: &VersionEngine,
    row: &VersionRow,
    name: &str,
    targets: &[&VersionRow],
) -> VestigeResult<()> {
    let end = relation_end(engine, row.entity(), name)?;
    check_owner(row, name)?;
    check_targets(&end, targets)?;
    let now_view = row.clone().with_query_time(QueryTime::Current);
    let current: BTreeSet<VersionKey> = related(engine, &now_view, name)?
        .iter()
        .map(VersionRow::identity)
        .collect();
    let wanted: BTreeSet<VersionKey> = targets.iter().map(|t| t.identity()).collect();
    let being_removed: Vec<VersionKey> = current.difference(&wanted).copied().collect();
    let being_added: Vec<&VersionRow> = targets
        .iter()
        .copied()
        .filter(|t| !current.contains(&t.identity()))
        .collect();

    let at = now();
    engine.transaction(|| {
        remove_identities(engine, &end, row.identity(), &being_removed, at)?;
        add_at(engine, row, name, &being_added, at)?;
        Ok(())
    })
}

/// Terminate every current association of the given identities of `entity`,
/// on whichever side they appear.
pub(crate) fn terminate_associations(
    engine: &VersionEngine,
    entity: &str,
    identities: &[VersionKey],
    at: DateTime<Utc>,
) -> VestigeResult<usize> {
    if identities.is_empty() {
        return Ok(0);
    }
    let mut terminated = 0;
    for (through, column) in engine.catalog.join_columns(entity) {
        for keys in key_batches(identities, engine.config.relation_batch_size) {
            terminated += terminate_where(
                engine,
                &through,
                Predicate::In {
                    column: ColumnRef::new(&through, &column),
                    values: keys,
                },
                at,
            )?;
        }
    }
    Ok(terminated)
}

/// Point every join row referencing `identity` at `key` instead.
pub(crate) fn repoint_associations(
    engine: &VersionEngine,
    entity: &str,
    identity: VersionKey,
    key: VersionKey,
) -> VestigeResult<usize> {
    let mut repointed = 0;
    for (through, column) in engine.catalog.join_columns(entity) {
        repointed += engine.storage.update(&Update {
            table: through.clone(),
            assignments: vec![(column.clone(), Value::Key(key))],
            filter: Predicate::eq(ColumnRef::new(&through, &column), identity),
        })?;
    }
    Ok(repointed)
}
