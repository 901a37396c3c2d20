//! StorageEngine: the SQLite implementation of `IVersionStorage`.

use rusqlite::params_from_iter;
use tracing::{debug, trace};

use vestige_core::config::{IdentifierMode, StorageConfig};
use vestige_core::query::{Delete, Insert, Projection, Select, Update};
use vestige_core::schema::{IndexDef, TableDef};
use vestige_core::traits::{IVersionStorage, Record};
use vestige_core::{VestigeError, VestigeResult};

use crate::codec;
use crate::map_sqlite_err;
use crate::pool::ConnectionPool;
use crate::render::{self, Statement};

pub struct StorageEngine {
    pool: ConnectionPool,
    mode: IdentifierMode,
}

impl StorageEngine {
    pub fn open(config: &StorageConfig, mode: IdentifierMode) -> VestigeResult<Self> {
        let pool = ConnectionPool::open(config)?;
        Ok(Self { pool, mode })
    }

    pub fn open_in_memory(mode: IdentifierMode) -> VestigeResult<Self> {
        Self::open(&StorageConfig::default(), mode)
    }

    pub fn identifier_mode(&self) -> IdentifierMode {
        self.mode
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Nesting depth of the open transaction, 0 when none is open.
    pub fn transaction_depth(&self) -> VestigeResult<usize> {
        self.pool.depth()
    }

    fn execute(&self, stmt: Statement) -> VestigeResult<usize> {
        trace!(sql = %stmt.sql, params = stmt.params.len(), "execute");
        let mode = self.mode;
        self.pool.with_writer(|w| {
            let mut prepared = w.conn.prepare_cached(&stmt.sql).map_err(map_sqlite_err)?;
            prepared
                .execute(params_from_iter(
                    stmt.params.iter().map(|v| codec::to_sql(v, mode)),
                ))
                .map_err(map_sqlite_err)
        })
    }
}

impl IVersionStorage for StorageEngine {
    fn select(&self, query: &Select) -> VestigeResult<Vec<Record>> {
        let stmt = render::render_select(query)?;
        let Projection::Columns(columns) = &query.projection else {
            return Err(VestigeError::InvalidArgument(
                "select needs a column projection".to_string(),
            ));
        };
        trace!(sql = %stmt.sql, params = stmt.params.len(), "select");
        let mode = self.mode;
        self.pool.with_writer(|w| {
            let mut prepared = w.conn.prepare_cached(&stmt.sql).map_err(map_sqlite_err)?;
            let mut rows = prepared
                .query(params_from_iter(
                    stmt.params.iter().map(|v| codec::to_sql(v, mode)),
                ))
                .map_err(map_sqlite_err)?;
            let mut records = Vec::new();
            while let Some(row) = rows.next().map_err(map_sqlite_err)? {
                let mut record = Record::new();
                for (i, column) in columns.iter().enumerate() {
                    let raw = row.get_ref(i).map_err(map_sqlite_err)?;
                    let value = codec::from_sql(raw, column.kind, &column.label)?;
                    record.insert(column.label.clone(), value);
                }
                records.push(record);
            }
            Ok(records)
        })
    }

    fn count(&self, query: &Select) -> VestigeResult<u64> {
        let stmt = render::render_count(query)?;
        trace!(sql = %stmt.sql, params = stmt.params.len(), "count");
        let mode = self.mode;
        self.pool.with_writer(|w| {
            let mut prepared = w.conn.prepare_cached(&stmt.sql).map_err(map_sqlite_err)?;
            let count: i64 = prepared
                .query_row(
                    params_from_iter(stmt.params.iter().map(|v| codec::to_sql(v, mode))),
                    |row| row.get(0),
                )
                .map_err(map_sqlite_err)?;
            Ok(count.max(0) as u64)
        })
    }

    fn insert(&self, insert: &Insert) -> VestigeResult<usize> {
        self.execute(render::render_insert(insert)?)
    }

    fn update(&self, update: &Update) -> VestigeResult<usize> {
        self.execute(render::render_update(update)?)
    }

    fn delete(&self, delete: &Delete) -> VestigeResult<usize> {
        self.execute(render::render_delete(delete))
    }

    fn begin(&self) -> VestigeResult<()> {
        self.pool.begin()
    }

    fn commit(&self) -> VestigeResult<()> {
        self.pool.commit()
    }

    fn rollback(&self) -> VestigeResult<()> {
        self.pool.rollback()
    }

    fn create_table(&self, table: &TableDef) -> VestigeResult<()> {
        let sql = render::render_create_table(table, self.mode);
        debug!(table = %table.name, "create table");
        self.pool
            .with_writer(|w| w.conn.execute_batch(&sql).map_err(map_sqlite_err))
    }

    fn create_index(&self, index: &IndexDef) -> VestigeResult<()> {
        let sql = render::render_create_index(index);
        debug!(index = %index.name, table = %index.table, "create index");
        self.pool
            .with_writer(|w| w.conn.execute_batch(&sql).map_err(map_sqlite_err))
    }

    fn index_exists(&self, name: &str) -> VestigeResult<bool> {
        self.pool.with_writer(|w| {
            w.conn
                .prepare_cached("SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1")
                .and_then(|mut stmt| stmt.exists([name]))
                .map_err(map_sqlite_err)
        })
    }
}
