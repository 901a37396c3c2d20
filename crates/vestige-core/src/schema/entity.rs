use super::{ColumnDef, IndexDef, ManyToMany, Reference, TableDef};
use crate::errors::{VestigeError, VestigeResult};
use crate::models::{
    ValueKind, BORN_AT_COLUMN, IDENTITY_COLUMN, KEY_COLUMN, VALID_FROM_COLUMN,
    VALID_UNTIL_COLUMN, VERSION_COLUMNS,
};

/// A plain data column.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: ValueKind,
    pub required: bool,
}

/// Declaration of one entity type and the table backing it.
///
/// Versioned entities keep every historical row; plain entities share the
/// same row layout but are hard-deleted and cannot be cloned or restored.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    versioned: bool,
    auto_created: bool,
    attributes: Vec<Attribute>,
    references: Vec<Reference>,
    relations: Vec<ManyToMany>,
    unique_when_current: Vec<Vec<String>>,
}

impl EntitySchema {
    pub fn versioned(name: impl Into<String>) -> Self {
        Self::with_mode(name.into(), true)
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::with_mode(name.into(), false)
    }

    fn with_mode(name: String, versioned: bool) -> Self {
        Self {
            name,
            versioned,
            auto_created: false,
            attributes: Vec::new(),
            references: Vec::new(),
            relations: Vec::new(),
            unique_when_current: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional_attribute(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn many_to_many(mut self, relation: ManyToMany) -> Self {
        let relation = relation.complete(&self.name);
        self.relations.push(relation);
        self
    }

    /// Columns that must be unique among current rows only.
    pub fn unique_when_current<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_when_current
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn mark_auto_created(mut self) -> Self {
        self.auto_created = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// True for join tables generated from a many-to-many declaration.
    pub fn is_auto_created(&self) -> bool {
        self.auto_created
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn relations(&self) -> &[ManyToMany] {
        &self.relations
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn find_reference(&self, name: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.name == name)
    }

    pub fn find_relation(&self, name: &str) -> Option<&ManyToMany> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Storage kind of any column on this entity's table.
    pub fn column_kind(&self, column: &str) -> Option<ValueKind> {
        match column {
            KEY_COLUMN | IDENTITY_COLUMN => Some(ValueKind::Key),
            VALID_FROM_COLUMN | VALID_UNTIL_COLUMN | BORN_AT_COLUMN => Some(ValueKind::Timestamp),
            _ => self
                .find_attribute(column)
                .map(|a| a.kind)
                .or_else(|| self.find_reference(column).map(|_| ValueKind::Key)),
        }
    }

    /// Every column of the table, bookkeeping columns first.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = VERSION_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(self.data_columns().into_iter().map(|(name, _)| name.to_string()));
        columns
    }

    /// Attribute and reference columns with their kinds.
    pub fn data_columns(&self) -> Vec<(&str, ValueKind)> {
        self.attributes
            .iter()
            .map(|a| (a.name.as_str(), a.kind))
            .chain(self.references.iter().map(|r| (r.name.as_str(), ValueKind::Key)))
            .collect()
    }

    /// Field-level checks that need no other entity.
    pub(crate) fn check(&self) -> VestigeResult<()> {
        if self.name.is_empty() {
            return Err(VestigeError::InvalidArgument("entity name is empty".into()));
        }
        let mut seen = std::collections::BTreeSet::new();
        let names = self
            .attributes
            .iter()
            .map(|a| &a.name)
            .chain(self.references.iter().map(|r| &r.name))
            .chain(self.relations.iter().map(|r| &r.name));
        for name in names {
            if VERSION_COLUMNS.contains(&name.as_str()) {
                return Err(VestigeError::InvalidArgument(format!(
                    "{}.{name} collides with a bookkeeping column",
                    self.name
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(VestigeError::InvalidArgument(format!(
                    "{}.{name} is declared twice",
                    self.name
                )));
            }
        }
        for reference in &self.references {
            if reference.required && matches!(reference.on_delete, super::OnDelete::SetNull) {
                return Err(VestigeError::InvalidArgument(format!(
                    "{}.{} is required and cannot use set_null",
                    self.name, reference.name
                )));
            }
        }
        for columns in &self.unique_when_current {
            for column in columns {
                if self.column_kind(column).is_none() {
                    return Err(VestigeError::UnknownField {
                        entity: self.name.clone(),
                        field: column.clone(),
                    });
                }
            }
        }
        for relation in &self.relations {
            if relation.symmetrical && relation.target != self.name {
                return Err(VestigeError::InvalidArgument(format!(
                    "{}.{} is symmetrical but not self-referential",
                    self.name, relation.name
                )));
            }
        }
        Ok(())
    }

    pub fn table_def(&self) -> TableDef {
        let mut table = TableDef::versioned(&self.name);
        for attribute in &self.attributes {
            table.columns.push(ColumnDef::new(
                &attribute.name,
                attribute.kind,
                !attribute.required,
            ));
        }
        for reference in &self.references {
            table
                .columns
                .push(ColumnDef::new(&reference.name, ValueKind::Key, !reference.required));
        }
        table
    }

    pub fn index_defs(&self) -> Vec<IndexDef> {
        let mut indexes = if self.versioned {
            IndexDef::versioning_indexes(&self.name)
        } else {
            Vec::new()
        };
        for reference in &self.references {
            indexes.push(IndexDef::lookup(&self.name, &reference.name));
        }
        for columns in &self.unique_when_current {
            indexes.push(IndexDef {
                name: format!("{}_{}_current_uniq", self.name, columns.join("_")),
                table: self.name.clone(),
                columns: columns.clone(),
                unique: true,
                current_only: self.versioned,
            });
        }
        indexes
    }
}
