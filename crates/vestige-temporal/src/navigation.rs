//! Walking the version chain of one object.

use chrono::{DateTime, Duration, Utc};

use vestige_core::models::{IDENTITY_COLUMN, VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{ColumnRef, CompareOp, Predicate};
use vestige_core::{normalize_timestamp, QueryTime, VersionKey, VersionRow, VestigeError, VestigeResult};

use crate::engine::{VersionEngine, BASE_ALIAS};

/// Query time given to a version returned by navigation, which decides what
/// its relations resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationsAsOf {
    /// The version's `valid_from`.
    Start,
    /// The last instant of the version: current state for the current
    /// version, `valid_until - 1µs` otherwise.
    End,
    /// An explicit instant inside the version's interval.
    At(DateTime<Utc>),
    /// No time restriction.
    Unbounded,
}

impl RelationsAsOf {
    pub(crate) fn apply(self, mut row: VersionRow) -> VestigeResult<VersionRow> {
        let time = match self {
            RelationsAsOf::Start => QueryTime::AsOf(row.valid_from()),
            RelationsAsOf::End => match row.valid_until() {
                None => QueryTime::Current,
                Some(until) => QueryTime::AsOf(until - Duration::microseconds(1)),
            },
            RelationsAsOf::At(at) => {
                let at = normalize_timestamp(at);
                if at < row.valid_from() {
                    return Err(VestigeError::InvalidArgument(format!(
                        "{at} is earlier than the version start {}",
                        row.valid_from()
                    )));
                }
                if let Some(until) = row.valid_until().filter(|until| at >= *until) {
                    return Err(VestigeError::InvalidArgument(format!(
                        "{at} is not earlier than the version end {until}"
                    )));
                }
                QueryTime::AsOf(at)
            }
            RelationsAsOf::Unbounded => QueryTime::Unbounded,
        };
        row.set_query_time(time);
        Ok(row)
    }
}

/// The version that follows `row`. The current version is its own next.
pub fn next_version(
    engine: &VersionEngine,
    row: &VersionRow,
    relations_as_of: RelationsAsOf,
) -> VestigeResult<VersionRow> {
    let Some(until) = row.valid_until() else {
        return relations_as_of.apply(row.clone());
    };
    let schema = engine.versioned_schema(row.entity(), "next_version")?;
    let select = engine
        .base_select(&schema, None)?
        .filter(Predicate::eq(
            ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
            row.identity(),
        ))
        .filter(Predicate::compare(
            ColumnRef::new(BASE_ALIAS, VALID_FROM_COLUMN),
            CompareOp::Gte,
            until,
        ))
        .order(ColumnRef::new(BASE_ALIAS, VALID_FROM_COLUMN), false)
        .limit(2);
    let candidates = engine.fetch_rows(&schema, &select, QueryTime::Unbounded, false)?;
    let next = match candidates.as_slice() {
        [] => {
            return Err(VestigeError::ObjectNotFound {
                entity: schema.name().to_string(),
                detail: format!("no version of {} after {until}", row.identity()),
            })
        }
        [first, second] if first.valid_from() == second.valid_from() => {
            return Err(VestigeError::AmbiguousVersion {
                entity: schema.name().to_string(),
                detail: format!(
                    "several versions of {} start at {}",
                    row.identity(),
                    first.valid_from()
                ),
            })
        }
        [first, ..] => first.clone(),
    };
    relations_as_of.apply(next)
}

/// The version that precedes `row`. The first version is its own previous.
pub fn previous_version(
    engine: &VersionEngine,
    row: &VersionRow,
    relations_as_of: RelationsAsOf,
) -> VestigeResult<VersionRow> {
    if row.born_at() == row.valid_from() {
        return relations_as_of.apply(row.clone());
    }
    let schema = engine.versioned_schema(row.entity(), "previous_version")?;
    let select = engine
        .base_select(&schema, None)?
        .filter(Predicate::eq(
            ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
            row.identity(),
        ))
        .filter(Predicate::compare(
            ColumnRef::new(BASE_ALIAS, VALID_UNTIL_COLUMN),
            CompareOp::Lte,
            row.valid_from(),
        ))
        .order(ColumnRef::new(BASE_ALIAS, VALID_UNTIL_COLUMN), true)
        .limit(1);
    let previous = engine
        .fetch_rows(&schema, &select, QueryTime::Unbounded, false)?
        .into_iter()
        .next()
        .ok_or_else(|| VestigeError::ObjectNotFound {
            entity: schema.name().to_string(),
            detail: format!("no version of {} before {}", row.identity(), row.valid_from()),
        })?;
    relations_as_of.apply(previous)
}

/// The current version of `row`'s object, or `None` when it was deleted.
///
/// Without `check_db` a current `row` is returned as is.
pub fn current_version(
    engine: &VersionEngine,
    row: &VersionRow,
    relations_as_of: RelationsAsOf,
    check_db: bool,
) -> VestigeResult<Option<VersionRow>> {
    if row.is_current() && !check_db {
        return relations_as_of.apply(row.clone()).map(Some);
    }
    let schema = engine.versioned_schema(row.entity(), "current_version")?;
    let select = engine
        .base_select(&schema, None)?
        .filter(Predicate::eq(
            ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
            row.identity(),
        ))
        .filter(Predicate::temporal(BASE_ALIAS, QueryTime::Current))
        .limit(1);
    engine
        .fetch_rows(&schema, &select, QueryTime::Current, false)?
        .into_iter()
        .next()
        .map(|current| relations_as_of.apply(current))
        .transpose()
}

/// The version of `identity` valid at `at`, carrying `at` as its query time.
pub fn version_at(
    engine: &VersionEngine,
    entity: &str,
    identity: VersionKey,
    at: DateTime<Utc>,
) -> VestigeResult<Option<VersionRow>> {
    let schema = engine.versioned_schema(entity, "version_at")?;
    let time = QueryTime::AsOf(normalize_timestamp(at));
    let select = engine
        .base_select(&schema, None)?
        .filter(Predicate::eq(
            ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
            identity,
        ))
        .filter(Predicate::temporal(BASE_ALIAS, time))
        .limit(2);
    let mut rows = engine.fetch_rows(&schema, &select, time, false)?;
    if rows.len() > 1 {
        return Err(VestigeError::AmbiguousVersion {
            entity: entity.to_string(),
            detail: format!("identity {identity} has several versions at {at}"),
        });
    }
    Ok(rows.pop())
}
