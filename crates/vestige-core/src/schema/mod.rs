//! Schema catalog: entity declarations, references, many-to-many relations
//! and the DDL derived from them.

mod catalog;
mod ddl;
mod entity;
mod reference;
mod relation;

pub use catalog::{reverse_name, Catalog, RelationEnd, ReverseReference};
pub use ddl::{ColumnDef, IndexDef, TableDef};
pub use entity::{Attribute, EntitySchema};
pub use reference::{DefaultValue, OnDelete, Reference};
pub use relation::ManyToMany;
