//! Relationship versioning: to-one references, reverse references and
//! many-to-many associations held in versioned join tables.

pub mod many_to_many;
pub mod relation_clone;
pub mod reverse;
pub mod to_one;

use vestige_core::QueryTime;

/// Time used to navigate from a row. A row without a time context navigates
/// the current state.
pub(crate) fn relation_time(time: QueryTime) -> QueryTime {
    match time {
        QueryTime::Unbounded => QueryTime::Current,
        other => other,
    }
}
