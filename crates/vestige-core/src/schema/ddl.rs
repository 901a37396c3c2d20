//! Table and index definitions handed to the storage collaborator.

use crate::models::{
    ValueKind, BORN_AT_COLUMN, IDENTITY_COLUMN, KEY_COLUMN, VALID_FROM_COLUMN,
    VALID_UNTIL_COLUMN,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ValueKind,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ValueKind, nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable,
            primary_key: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// A table holding only the bookkeeping columns.
    pub fn versioned(name: &str) -> Self {
        let mut key = ColumnDef::new(KEY_COLUMN, ValueKind::Key, false);
        key.primary_key = true;
        Self {
            name: name.to_string(),
            columns: vec![
                key,
                ColumnDef::new(IDENTITY_COLUMN, ValueKind::Key, false),
                ColumnDef::new(VALID_FROM_COLUMN, ValueKind::Timestamp, false),
                ColumnDef::new(VALID_UNTIL_COLUMN, ValueKind::Timestamp, true),
                ColumnDef::new(BORN_AT_COLUMN, ValueKind::Timestamp, false),
            ],
        }
    }
}

/// An index. `current_only` restricts it to rows with `valid_until IS NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub current_only: bool,
}

impl IndexDef {
    /// One current row per identity, plus lookup indexes on identity and interval.
    pub fn versioning_indexes(table: &str) -> Vec<IndexDef> {
        vec![
            IndexDef {
                name: format!("{table}_current_identity_uniq"),
                table: table.to_string(),
                columns: vec![IDENTITY_COLUMN.to_string()],
                unique: true,
                current_only: true,
            },
            IndexDef::lookup(table, IDENTITY_COLUMN),
            IndexDef {
                name: format!("{table}_validity_idx"),
                table: table.to_string(),
                columns: vec![VALID_FROM_COLUMN.to_string(), VALID_UNTIL_COLUMN.to_string()],
                unique: false,
                current_only: false,
            },
        ]
    }

    pub fn lookup(table: &str, column: &str) -> IndexDef {
        IndexDef {
            name: format!("{table}_{column}_idx"),
            table: table.to_string(),
            columns: vec![column.to_string()],
            unique: false,
            current_only: false,
        }
    }
}
