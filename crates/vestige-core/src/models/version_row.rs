//! One physical record representing one object at one point in its lifetime.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{normalize_timestamp, QueryTime, Value, VersionKey};
use crate::errors::{VestigeError, VestigeResult};

/// Decoded column values used to rebuild a row read back from storage.
#[derive(Debug, Clone)]
pub struct RowParts {
    pub entity: String,
    pub key: VersionKey,
    pub identity: VersionKey,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub born_at: DateTime<Utc>,
    pub attributes: BTreeMap<String, Value>,
    /// Only part of the attributes were loaded.
    pub deferred: bool,
}

/// A version row.
///
/// `key` is the surrogate key, unique per row. `identity` groups every row of
/// one logical object. The most recently created row of an identity always has
/// `key == identity` (the head). Bookkeeping fields are private; they only
/// change through the transition functions below, each of which checks the
/// lifecycle state it requires.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRow {
    entity: String,
    key: VersionKey,
    identity: VersionKey,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    born_at: DateTime<Utc>,
    attributes: BTreeMap<String, Value>,
    deferred: bool,
    query_time: QueryTime,
    related: BTreeMap<String, VersionRow>,
}

impl VersionRow {
    /// A brand-new head row: `key == identity`, born and valid from `at`.
    pub fn new_head(
        entity: impl Into<String>,
        key: VersionKey,
        at: DateTime<Utc>,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        let at = normalize_timestamp(at);
        Self {
            entity: entity.into(),
            key,
            identity: key,
            valid_from: at,
            valid_until: None,
            born_at: at,
            attributes,
            deferred: false,
            query_time: QueryTime::Current,
            related: BTreeMap::new(),
        }
    }

    /// Rebuild a row from storage, rejecting interval corruption.
    pub fn from_parts(parts: RowParts) -> VestigeResult<Self> {
        if parts.born_at > parts.valid_from {
            return Err(VestigeError::InvalidState(format!(
                "{} {}: born_at is after valid_from",
                parts.entity, parts.key
            )));
        }
        if let Some(end) = parts.valid_until {
            if end < parts.valid_from {
                return Err(VestigeError::InvalidState(format!(
                    "{} {}: valid_until precedes valid_from",
                    parts.entity, parts.key
                )));
            }
        }
        Ok(Self {
            entity: parts.entity,
            key: parts.key,
            identity: parts.identity,
            valid_from: parts.valid_from,
            valid_until: parts.valid_until,
            born_at: parts.born_at,
            attributes: parts.attributes,
            deferred: parts.deferred,
            query_time: QueryTime::Unbounded,
            related: BTreeMap::new(),
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn key(&self) -> VersionKey {
        self.key
    }

    pub fn identity(&self) -> VersionKey {
        self.identity
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    pub fn born_at(&self) -> DateTime<Utc> {
        self.born_at
    }

    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }

    pub fn is_terminated(&self) -> bool {
        self.valid_until.is_some()
    }

    /// Head position check; does not consult storage and says nothing about
    /// whether the object is soft-deleted.
    pub fn is_latest(&self) -> bool {
        self.key == self.identity
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn query_time(&self) -> QueryTime {
        self.query_time
    }

    pub fn set_query_time(&mut self, time: QueryTime) {
        self.query_time = time;
    }

    pub fn with_query_time(mut self, time: QueryTime) -> Self {
        self.query_time = time;
        self
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set an attribute (or reference column) value in memory.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.related.remove(&name);
        self.attributes.insert(name, value.into());
    }

    pub fn cached_related(&self, reference: &str) -> Option<&VersionRow> {
        self.related.get(reference)
    }

    pub fn cache_related(&mut self, reference: impl Into<String>, row: VersionRow) {
        self.related.insert(reference.into(), row);
    }

    /// Relocate a brand-new row in time. Only allowed while the row is current
    /// and has never been cloned (`born_at == valid_from`).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> VestigeResult<Self> {
        if !self.is_current() {
            return Err(VestigeError::InvalidState(format!(
                "cannot relocate historical version {} of {}",
                self.key, self.entity
            )));
        }
        if self.born_at != self.valid_from {
            return Err(VestigeError::InvalidState(format!(
                "cannot relocate {} {}: it has already been versioned",
                self.entity, self.identity
            )));
        }
        let ts = normalize_timestamp(timestamp);
        self.born_at = ts;
        self.valid_from = ts;
        Ok(self)
    }

    /// Split a current row at `at`: returns `(historical, next)`.
    ///
    /// `historical` receives `fresh` as its surrogate key and is closed at
    /// `at`; `next` keeps the head key and opens at `at`.
    pub fn split_at(
        &self,
        at: DateTime<Utc>,
        fresh: VersionKey,
    ) -> VestigeResult<(VersionRow, VersionRow)> {
        let at = normalize_timestamp(at);
        if !self.is_current() {
            return Err(VestigeError::InvalidState(format!(
                "version {} of {} is historical and cannot be cloned",
                self.key, self.entity
            )));
        }
        if self.deferred {
            return Err(VestigeError::InvalidState(format!(
                "{} {} was loaded with deferred attributes",
                self.entity, self.identity
            )));
        }
        if at < self.valid_from {
            return Err(VestigeError::InvalidState(format!(
                "clone time {at} precedes the version start {}",
                self.valid_from
            )));
        }
        if fresh == self.identity {
            return Err(VestigeError::InvalidArgument(
                "historical key must differ from the identity".to_string(),
            ));
        }

        let mut historical = self.clone();
        historical.key = fresh;
        historical.valid_until = Some(at);
        historical.query_time = QueryTime::AsOf(self.valid_from);
        historical.related.clear();

        let mut next = self.clone();
        next.valid_from = at;
        next.valid_until = None;
        next.query_time = QueryTime::Current;
        next.related.clear();

        Ok((historical, next))
    }

    /// Close the interval of a current row at `at`.
    pub fn terminate_at(&mut self, at: DateTime<Utc>) -> VestigeResult<()> {
        if self.valid_until.is_some() {
            return Err(VestigeError::AlreadyTerminated {
                entity: self.entity.clone(),
                key: self.key.to_string(),
            });
        }
        let at = normalize_timestamp(at);
        if at < self.valid_from {
            return Err(VestigeError::InvalidState(format!(
                "termination time {at} precedes the version start {}",
                self.valid_from
            )));
        }
        self.valid_until = Some(at);
        Ok(())
    }

    /// Give up the head slot: the row receives a fresh surrogate key.
    pub fn release_head(&mut self) -> VestigeResult<VersionKey> {
        if !self.is_latest() {
            return Err(VestigeError::InvalidState(format!(
                "version {} of {} does not hold the head slot",
                self.key, self.entity
            )));
        }
        self.key = VersionKey::new();
        Ok(self.key)
    }

    /// A new head row for this identity, opening at `valid_from`, carrying
    /// the given attributes. Used to restore a terminated version.
    pub fn restored(
        &self,
        valid_from: DateTime<Utc>,
        attributes: BTreeMap<String, Value>,
    ) -> VestigeResult<VersionRow> {
        if self.is_current() {
            return Err(VestigeError::InvalidState(format!(
                "{} {} is the current version; nothing to restore",
                self.entity, self.identity
            )));
        }
        if self.deferred {
            return Err(VestigeError::InvalidState(format!(
                "{} {} was loaded with deferred attributes",
                self.entity, self.identity
            )));
        }
        Ok(VersionRow {
            entity: self.entity.clone(),
            key: self.identity,
            identity: self.identity,
            valid_from: normalize_timestamp(valid_from),
            valid_until: None,
            born_at: self.born_at,
            attributes,
            deferred: false,
            query_time: QueryTime::Current,
            related: BTreeMap::new(),
        })
    }

    /// A new, unrelated object carrying this row's attribute values.
    pub fn detached(&self, at: DateTime<Utc>) -> VestigeResult<VersionRow> {
        if self.deferred {
            return Err(VestigeError::InvalidState(format!(
                "{} {} was loaded with deferred attributes",
                self.entity, self.identity
            )));
        }
        Ok(VersionRow::new_head(
            self.entity.clone(),
            VersionKey::new(),
            at,
            self.attributes.clone(),
        ))
    }
}
