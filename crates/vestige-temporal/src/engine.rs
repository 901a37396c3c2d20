//! VersionEngine: central orchestrator over the storage collaborator.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use vestige_core::config::VersioningConfig;
use vestige_core::query::{ColumnRef, Predicate, Projection, Select};
use vestige_core::schema::{Catalog, EntitySchema};
use vestige_core::traits::IVersionStorage;
use vestige_core::{QueryTime, Value, VersionKey, VersionRow, VestigeError, VestigeResult};
use vestige_storage::bootstrap;

use crate::decode;
use crate::deletion::{self, CollectorRegistry, ICollectorHooks};
use crate::mutation;
use crate::navigation::{self, RelationsAsOf};
use crate::query::VersionedQuery;
use crate::relations;

/// Alias of the base table in every statement the engine builds.
pub(crate) const BASE_ALIAS: &str = "t0";

/// The versioning engine.
///
/// Holds the storage collaborator, the validated catalog and the versioning
/// config. All mutations that write more than one row run in one storage
/// transaction.
pub struct VersionEngine {
    pub(crate) storage: Arc<dyn IVersionStorage>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) config: VersioningConfig,
    pub(crate) collectors: CollectorRegistry,
}

impl VersionEngine {
    /// Create an engine with the default collector registry.
    pub fn new(
        storage: Arc<dyn IVersionStorage>,
        catalog: Catalog,
        config: VersioningConfig,
    ) -> VestigeResult<Self> {
        Self::with_collectors(storage, catalog, config, CollectorRegistry::default())
    }

    /// Create an engine resolving `config.collector` from `collectors`.
    pub fn with_collectors(
        storage: Arc<dyn IVersionStorage>,
        catalog: Catalog,
        config: VersioningConfig,
        collectors: CollectorRegistry,
    ) -> VestigeResult<Self> {
        catalog.validate()?;
        if config.relation_batch_size == 0 {
            return Err(VestigeError::Config(
                "relation_batch_size must be at least 1".to_string(),
            ));
        }
        collectors.resolve(&config.collector)?;
        debug!(
            entities = catalog.entities().count(),
            collector = %config.collector,
            "version engine ready"
        );
        Ok(Self {
            storage,
            catalog: Arc::new(catalog),
            config,
            collectors,
        })
    }

    /// Create missing tables and indexes. Returns how many indexes were created.
    pub fn ensure_schema(&self) -> VestigeResult<usize> {
        bootstrap::ensure_schema(self.storage.as_ref(), &self.catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn IVersionStorage {
        self.storage.as_ref()
    }

    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    pub(crate) fn hooks(&self) -> VestigeResult<Arc<dyn ICollectorHooks>> {
        self.collectors.resolve(&self.config.collector)
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// Query over every version of `entity`; narrow with `as_of`/`current`.
    pub fn query(&self, entity: &str) -> VersionedQuery<'_> {
        VersionedQuery::new(self, entity)
    }

    /// The version of `identity` valid at `at`, if any.
    pub fn version_at(
        &self,
        entity: &str,
        identity: VersionKey,
        at: DateTime<Utc>,
    ) -> VestigeResult<Option<VersionRow>> {
        navigation::version_at(self, entity, identity, at)
    }

    // ─── Mutations ──────────────────────────────────────────────────────────

    pub fn create<I, K>(&self, entity: &str, attributes: I) -> VestigeResult<VersionRow>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        mutation::create::create(self, entity, None, None, collect(attributes))
    }

    pub fn create_at<I, K>(
        &self,
        entity: &str,
        at: DateTime<Utc>,
        attributes: I,
    ) -> VestigeResult<VersionRow>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        mutation::create::create(self, entity, None, Some(at), collect(attributes))
    }

    /// Create with a caller-supplied key, which must be a version 4 UUID.
    pub fn create_with_key<I, K>(
        &self,
        entity: &str,
        key: &str,
        attributes: I,
    ) -> VestigeResult<VersionRow>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let key = VersionKey::parse(key)?;
        mutation::create::create(self, entity, Some(key), None, collect(attributes))
    }

    /// Insert or update the current row in place.
    pub fn save(&self, row: &mut VersionRow) -> VestigeResult<()> {
        mutation::save::save(self, row)
    }

    /// Clone `row` now. On return `row` describes the historical version.
    pub fn clone(&self, row: &mut VersionRow) -> VestigeResult<VersionRow> {
        mutation::clone::clone_at(self, row, None)
    }

    pub fn clone_at(&self, row: &mut VersionRow, at: DateTime<Utc>) -> VestigeResult<VersionRow> {
        mutation::clone::clone_at(self, row, Some(at))
    }

    /// Clone, apply `changes` to the new version and save it, atomically.
    pub fn revise<I, K>(&self, row: &mut VersionRow, changes: I) -> VestigeResult<VersionRow>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        mutation::clone::revise(self, row, collect(changes))
    }

    /// Soft-delete `row` and everything its references cascade to.
    pub fn delete(&self, row: &VersionRow) -> VestigeResult<usize> {
        deletion::delete_rows(self, vec![row.clone()], vestige_core::now())
    }

    pub fn delete_at(&self, row: &VersionRow, at: DateTime<Utc>) -> VestigeResult<usize> {
        deletion::delete_rows(self, vec![row.clone()], at)
    }

    /// Restore a terminated version as the new current version.
    pub fn restore<I, K>(&self, row: &mut VersionRow, overrides: I) -> VestigeResult<VersionRow>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        mutation::restore::restore(self, row, collect(overrides))
    }

    /// An unsaved copy of `row` with a fresh identity.
    pub fn detach(&self, row: &VersionRow) -> VestigeResult<VersionRow> {
        mutation::detach::detach(self, row)
    }

    // ─── Navigation ─────────────────────────────────────────────────────────

    pub fn next_version(
        &self,
        row: &VersionRow,
        relations_as_of: RelationsAsOf,
    ) -> VestigeResult<VersionRow> {
        navigation::next_version(self, row, relations_as_of)
    }

    pub fn previous_version(
        &self,
        row: &VersionRow,
        relations_as_of: RelationsAsOf,
    ) -> VestigeResult<VersionRow> {
        navigation::previous_version(self, row, relations_as_of)
    }

    /// `None` when the object is soft-deleted.
    pub fn current_version(
        &self,
        row: &VersionRow,
        relations_as_of: RelationsAsOf,
        check_db: bool,
    ) -> VestigeResult<Option<VersionRow>> {
        navigation::current_version(self, row, relations_as_of, check_db)
    }

    // ─── Relationships ──────────────────────────────────────────────────────

    /// Follow a to-one reference at the row's query time.
    pub fn resolve(&self, row: &VersionRow, reference: &str) -> VestigeResult<Option<VersionRow>> {
        relations::to_one::resolve(self, row, reference)
    }

    /// Rows whose to-one reference points at `row`, by reverse accessor name.
    pub fn referencing(&self, row: &VersionRow, name: &str) -> VestigeResult<Vec<VersionRow>> {
        relations::reverse::referencing(self, row, name)
    }

    /// Many-to-many targets of `row` at its query time.
    pub fn related(&self, row: &VersionRow, relation: &str) -> VestigeResult<Vec<VersionRow>> {
        relations::many_to_many::related(self, row, relation)
    }

    pub fn relation_count(&self, row: &VersionRow, relation: &str) -> VestigeResult<u64> {
        relations::many_to_many::relation_count(self, row, relation)
    }

    pub fn add(
        &self,
        row: &VersionRow,
        relation: &str,
        targets: &[&VersionRow],
    ) -> VestigeResult<usize> {
        relations::many_to_many::add_at(self, row, relation, targets, vestige_core::now())
    }

    pub fn add_at(
        &self,
        row: &VersionRow,
        relation: &str,
        targets: &[&VersionRow],
        at: DateTime<Utc>,
    ) -> VestigeResult<usize> {
        relations::many_to_many::add_at(self, row, relation, targets, at)
    }

    pub fn remove(
        &self,
        row: &VersionRow,
        relation: &str,
        targets: &[&VersionRow],
    ) -> VestigeResult<usize> {
        relations::many_to_many::remove_at(self, row, relation, targets, vestige_core::now())
    }

    pub fn remove_at(
        &self,
        row: &VersionRow,
        relation: &str,
        targets: &[&VersionRow],
        at: DateTime<Utc>,
    ) -> VestigeResult<usize> {
        relations::many_to_many::remove_at(self, row, relation, targets, at)
    }

    /// Replace the current target set, removing and adding only the difference.
    pub fn assign(
        &self,
        row: &VersionRow,
        relation: &str,
        targets: &[&VersionRow],
    ) -> VestigeResult<()> {
        relations::many_to_many::assign(self, row, relation, targets)
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    pub(crate) fn schema(&self, entity: &str) -> VestigeResult<Arc<EntitySchema>> {
        self.catalog.entity(entity).cloned()
    }

    /// Schema of an entity that keeps history; plain entities are refused.
    pub(crate) fn versioned_schema(
        &self,
        entity: &str,
        operation: &str,
    ) -> VestigeResult<Arc<EntitySchema>> {
        let schema = self.schema(entity)?;
        if !schema.is_versioned() {
            return Err(VestigeError::InvalidState(format!(
                "{entity} is not versioned and does not support {operation}"
            )));
        }
        Ok(schema)
    }

    /// Run `f` inside a (possibly nested) storage transaction.
    pub(crate) fn transaction<T>(&self, f: impl FnOnce() -> VestigeResult<T>) -> VestigeResult<T> {
        self.storage.begin()?;
        match f().and_then(|value| self.storage.commit().map(|()| value)) {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Err(rollback) = self.storage.rollback() {
                    warn!("rollback after `{e}` failed: {rollback}");
                }
                Err(e)
            }
        }
    }

    /// Select of every column of `schema` aliased as [`BASE_ALIAS`].
    pub(crate) fn base_select(
        &self,
        schema: &EntitySchema,
        only: Option<&[String]>,
    ) -> VestigeResult<Select> {
        let columns = decode::select_columns(schema, BASE_ALIAS, only)?;
        Ok(Select::from(schema.name(), BASE_ALIAS).project(Projection::Columns(columns)))
    }

    pub(crate) fn fetch_rows(
        &self,
        schema: &EntitySchema,
        select: &Select,
        time: QueryTime,
        deferred: bool,
    ) -> VestigeResult<Vec<VersionRow>> {
        self.storage
            .select(select)?
            .into_iter()
            .map(|record| decode::row_from_record(schema, record, deferred, time))
            .collect()
    }

    /// The row stored under surrogate key `key`, whatever its state.
    pub(crate) fn find_by_key(
        &self,
        schema: &EntitySchema,
        key: VersionKey,
    ) -> VestigeResult<Option<VersionRow>> {
        let select = self
            .base_select(schema, None)?
            .filter(Predicate::eq(ColumnRef::new(BASE_ALIAS, "id"), key))
            .limit(1);
        Ok(self
            .fetch_rows(schema, &select, QueryTime::Unbounded, false)?
            .into_iter()
            .next())
    }

    /// Temporal predicate for `alias`, or `True` for plain entities.
    pub(crate) fn temporal(&self, schema: &EntitySchema, alias: &str, time: QueryTime) -> Predicate {
        if schema.is_versioned() {
            Predicate::temporal(alias, time)
        } else {
            Predicate::True
        }
    }
}

/// `keys` as `IN` list values, at most `size` per list.
pub(crate) fn key_batches(
    keys: &[VersionKey],
    size: usize,
) -> impl Iterator<Item = Vec<Value>> + '_ {
    keys.chunks(size.max(1))
        .map(|chunk| chunk.iter().copied().map(Value::Key).collect())
}

pub(crate) fn collect<I, K>(attributes: I) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    attributes
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect()
}
