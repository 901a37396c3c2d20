//! IVersionStorage: the relational collaborator the versioning engine drives.

use std::collections::BTreeMap;

use crate::errors::VestigeResult;
use crate::models::Value;
use crate::query::{Delete, Insert, Select, Update};
use crate::schema::{IndexDef, TableDef};

/// One result row keyed by the select column labels.
pub type Record = BTreeMap<String, Value>;

/// Executes statements against a relational store.
///
/// Transactions nest: `begin` inside an open transaction opens a savepoint,
/// and the matching `commit`/`rollback` releases or rolls back to it. An open
/// transaction belongs to the thread that began it; statements from other
/// threads wait until it ends.
pub trait IVersionStorage: Send + Sync {
    fn select(&self, query: &Select) -> VestigeResult<Vec<Record>>;
    /// Evaluates a `CountAll`/`CountDistinct` projection.
    fn count(&self, query: &Select) -> VestigeResult<u64>;
    /// Returns the number of rows written.
    fn insert(&self, insert: &Insert) -> VestigeResult<usize>;
    fn update(&self, update: &Update) -> VestigeResult<usize>;
    fn delete(&self, delete: &Delete) -> VestigeResult<usize>;

    fn begin(&self) -> VestigeResult<()>;
    fn commit(&self) -> VestigeResult<()>;
    fn rollback(&self) -> VestigeResult<()>;

    fn create_table(&self, table: &TableDef) -> VestigeResult<()>;
    fn create_index(&self, index: &IndexDef) -> VestigeResult<()>;
    fn index_exists(&self, name: &str) -> VestigeResult<bool>;
}
