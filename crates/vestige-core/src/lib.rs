//! # vestige-core
//!
//! Foundation crate for the Vestige versioning engine.
//! Defines identifiers, values, version rows, query time, the schema catalog,
//! the statement AST, the storage collaborator trait, errors and config.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod errors;
pub mod models;
pub mod query;
pub mod schema;
pub mod tracing;
pub mod traits;

pub use config::VestigeConfig;
pub use errors::{StorageError, VestigeError, VestigeResult};
pub use models::{normalize_timestamp, now, QueryTime, Value, ValueKind, VersionKey, VersionRow};
pub use schema::{Catalog, EntitySchema, ManyToMany, OnDelete, Reference};
pub use traits::{IVersionStorage, Record};
