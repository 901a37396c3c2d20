use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use vestige_core::models::{IDENTITY_COLUMN, KEY_COLUMN};
use vestige_core::query::{ColumnRef, Predicate, Projection, Select};
use vestige_core::schema::EntitySchema;
use vestige_core::{now, QueryTime, Value, VersionKey, VersionRow, VestigeError, VestigeResult};

use super::lookup::PathCompiler;
use super::Filter;
use crate::deletion;
use crate::engine::{key_batches, VersionEngine, BASE_ALIAS};
use crate::relations::relation_time;

/// A query over one entity, evaluated at one [`QueryTime`].
///
/// Defaults to every version (`Unbounded`). Nothing runs until a terminal
/// method (`fetch`, `first`, `get`, `count`, `exists`, `delete`).
#[derive(Clone)]
pub struct VersionedQuery<'e> {
    engine: &'e VersionEngine,
    entity: String,
    time: QueryTime,
    filters: Vec<Filter>,
    order_by: Vec<(String, bool)>,
    limit: Option<usize>,
    only: Option<Vec<String>>,
    select_related: Vec<String>,
}

impl<'e> VersionedQuery<'e> {
    pub(crate) fn new(engine: &'e VersionEngine, entity: &str) -> Self {
        Self {
            engine,
            entity: entity.to_string(),
            time: QueryTime::Unbounded,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            only: None,
            select_related: Vec::new(),
        }
    }

    /// Restrict to versions valid at `at`; `None` means current versions.
    pub fn as_of(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.time = QueryTime::from_option(at);
        self
    }

    pub fn current(mut self) -> Self {
        self.time = QueryTime::Current;
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.time = QueryTime::Unbounded;
        self
    }

    pub fn time(&self) -> QueryTime {
        self.time
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Order by a lookup path; a leading `-` sorts descending.
    pub fn order_by(mut self, path: &str) -> Self {
        match path.strip_prefix('-') {
            Some(path) => self.order_by.push((path.to_string(), true)),
            None => self.order_by.push((path.to_string(), false)),
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Load only these data columns. The rows come back deferred and
    /// cannot be cloned or restored.
    pub fn only<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Prefetch these to-one references in one query per reference, at the
    /// time the rows' relations resolve at.
    pub fn select_related<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_related
            .extend(references.into_iter().map(Into::into));
        self
    }

    // ─── Terminal operations ────────────────────────────────────────────────

    pub fn fetch(&self) -> VestigeResult<Vec<VersionRow>> {
        let (schema, select) = self.compile()?;
        let mut rows =
            self.engine
                .fetch_rows(&schema, &select, self.time, self.only.is_some())?;
        for reference in &self.select_related {
            self.prefetch(&schema, &mut rows, reference)?;
        }
        debug!(entity = %self.entity, time = ?self.time, rows = rows.len(), "fetched");
        Ok(rows)
    }

    pub fn first(&self) -> VestigeResult<Option<VersionRow>> {
        Ok(self.clone().limit(1).fetch()?.into_iter().next())
    }

    /// The only matching row.
    pub fn get(&self) -> VestigeResult<VersionRow> {
        let mut rows = self.clone().limit(2).fetch()?;
        match rows.len() {
            0 => Err(VestigeError::ObjectNotFound {
                entity: self.entity.clone(),
                detail: format!("no row matches at {:?}", self.time),
            }),
            1 => Ok(rows.remove(0)),
            _ => Err(VestigeError::AmbiguousVersion {
                entity: self.entity.clone(),
                detail: format!("several rows match at {:?}", self.time),
            }),
        }
    }

    pub fn count(&self) -> VestigeResult<u64> {
        let (_, mut select) = self.compile()?;
        select.projection = if select.distinct {
            Projection::CountDistinct(ColumnRef::new(BASE_ALIAS, KEY_COLUMN))
        } else {
            Projection::CountAll
        };
        select.order_by.clear();
        select.limit = None;
        let count = self.engine.storage.count(&select)?;
        Ok(match self.limit {
            Some(limit) => count.min(limit as u64),
            None => count,
        })
    }

    pub fn exists(&self) -> VestigeResult<bool> {
        Ok(self.count()? > 0)
    }

    /// Soft-delete every current match, cascading through the collector.
    pub fn delete(&self) -> VestigeResult<usize> {
        let schema = self.engine.schema(&self.entity)?;
        let mut query = self.clone();
        if schema.is_versioned() {
            query.time = QueryTime::Current;
        }
        query.select_related.clear();
        query.only = None;
        let rows = query.fetch()?;
        deletion::delete_rows(self.engine, rows, now())
    }

    // ─── Compilation ────────────────────────────────────────────────────────

    fn compile(&self) -> VestigeResult<(Arc<EntitySchema>, Select)> {
        let schema = self.engine.schema(&self.entity)?;
        let mut select = self.engine.base_select(&schema, self.only.as_deref())?;

        let mut paths = PathCompiler::new(self.engine, Arc::clone(&schema), self.time);
        for filter in &self.filters {
            select = select.filter(paths.compile(filter)?);
        }
        for (path, descending) in &self.order_by {
            select = select.order(paths.column(path)?, *descending);
        }
        let (joins, multi_valued) = paths.finish();
        select.joins = joins;
        select.distinct = multi_valued;
        select = select.filter(self.engine.temporal(&schema, BASE_ALIAS, self.time));
        if let Some(limit) = self.limit {
            select = select.limit(limit);
        }
        Ok((schema, select))
    }

    fn prefetch(
        &self,
        schema: &EntitySchema,
        rows: &mut [VersionRow],
        reference: &str,
    ) -> VestigeResult<()> {
        let target_name = schema
            .find_reference(reference)
            .map(|r| r.target.clone())
            .ok_or_else(|| VestigeError::UnknownField {
                entity: schema.name().to_string(),
                field: reference.to_string(),
            })?;
        let identities: Vec<VersionKey> = rows
            .iter()
            .filter_map(|row| row.get(reference).and_then(Value::as_key))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if identities.is_empty() {
            return Ok(());
        }

        let time = relation_time(self.time);
        let target = self.engine.schema(&target_name)?;
        let mut targets: BTreeMap<VersionKey, VersionRow> = BTreeMap::new();
        for values in key_batches(&identities, self.engine.config.relation_batch_size) {
            let select = self
                .engine
                .base_select(&target, None)?
                .filter(Predicate::In {
                    column: ColumnRef::new(BASE_ALIAS, IDENTITY_COLUMN),
                    values,
                })
                .filter(self.engine.temporal(&target, BASE_ALIAS, time));
            targets.extend(
                self.engine
                    .fetch_rows(&target, &select, time, false)?
                    .into_iter()
                    .map(|row| (row.identity(), row)),
            );
        }

        for row in rows.iter_mut() {
            let Some(identity) = row.get(reference).and_then(Value::as_key) else {
                continue;
            };
            if let Some(target) = targets.get(&identity) {
                row.cache_related(reference, target.clone());
            }
        }
        Ok(())
    }
}
