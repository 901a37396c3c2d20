//! Many-to-many relations backed by a versioned join table.

use super::{ColumnDef, EntitySchema, IndexDef, TableDef};
use crate::models::ValueKind;

/// A many-to-many relation declared on its owning entity.
///
/// The join table is itself versioned: each association row has its own
/// surrogate key, identity and validity interval. Its two end columns hold
/// the surrogate key of the participant version that was valid for the whole
/// of the association row's interval, which for current rows is the
/// participant's identity.
#[derive(Debug, Clone)]
pub struct ManyToMany {
    pub name: String,
    pub target: String,
    pub through: String,
    pub source_column: String,
    pub target_column: String,
    pub symmetrical: bool,
    pub related_name: Option<String>,
}

impl ManyToMany {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            through: String::new(),
            source_column: String::new(),
            target_column: String::new(),
            symmetrical: false,
            related_name: None,
        }
    }

    pub fn through(mut self, table: impl Into<String>) -> Self {
        self.through = table.into();
        self
    }

    pub fn columns(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_column = source.into();
        self.target_column = target.into();
        self
    }

    /// Only valid for self-referential relations; add/remove mirror on the
    /// inverse pair.
    pub fn symmetrical(mut self) -> Self {
        self.symmetrical = true;
        self
    }

    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    /// Fill in join table and column names not given explicitly.
    pub(crate) fn complete(mut self, owner: &str) -> Self {
        if self.through.is_empty() {
            self.through = format!("{owner}_{}", self.name);
        }
        let (from, to) = if owner == self.target {
            (format!("from_{owner}_id"), format!("to_{owner}_id"))
        } else {
            (format!("{owner}_id"), format!("{}_id", self.target))
        };
        if self.source_column.is_empty() {
            self.source_column = from;
        }
        if self.target_column.is_empty() {
            self.target_column = to;
        }
        self
    }

    /// The join table described as an auto-created versioned entity.
    pub fn through_schema(&self) -> EntitySchema {
        EntitySchema::versioned(self.through.clone())
            .attribute(self.source_column.clone(), ValueKind::Key)
            .attribute(self.target_column.clone(), ValueKind::Key)
            .mark_auto_created()
    }

    pub fn through_table_def(&self) -> TableDef {
        let mut table = TableDef::versioned(&self.through);
        table.columns.push(ColumnDef::new(&self.source_column, ValueKind::Key, false));
        table.columns.push(ColumnDef::new(&self.target_column, ValueKind::Key, false));
        table
    }

    pub fn through_index_defs(&self) -> Vec<IndexDef> {
        let mut indexes = IndexDef::versioning_indexes(&self.through);
        indexes.push(IndexDef {
            name: format!("{}_current_pair_uniq", self.through),
            table: self.through.clone(),
            columns: vec![self.source_column.clone(), self.target_column.clone()],
            unique: true,
            current_only: true,
        });
        indexes.push(IndexDef::lookup(&self.through, &self.source_column));
        indexes.push(IndexDef::lookup(&self.through, &self.target_column));
        indexes
    }
}
