//! The temporal context attached to a query and to every row it returns.

use chrono::{DateTime, Utc};

use super::{normalize_timestamp, VersionRow};

/// Point in time a query (and navigation from its results) resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryTime {
    /// No restriction; every version matches.
    #[default]
    Unbounded,
    /// Only current versions (`valid_until IS NULL`).
    Current,
    /// Versions whose interval `[valid_from, valid_until)` contains the instant.
    AsOf(DateTime<Utc>),
}

impl QueryTime {
    /// `None` means the current state.
    pub fn from_option(time: Option<DateTime<Utc>>) -> Self {
        match time {
            None => QueryTime::Current,
            Some(t) => QueryTime::AsOf(normalize_timestamp(t)),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, QueryTime::Unbounded)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            QueryTime::AsOf(t) => Some(*t),
            _ => None,
        }
    }

    /// In-memory form of the interval predicate.
    pub fn matches_interval(
        &self,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> bool {
        match self {
            QueryTime::Unbounded => true,
            QueryTime::Current => valid_until.is_none(),
            QueryTime::AsOf(t) => valid_from <= *t && valid_until.map_or(true, |end| end > *t),
        }
    }

    pub fn matches(&self, row: &VersionRow) -> bool {
        self.matches_interval(row.valid_from(), row.valid_until())
    }
}
