//! # vestige-temporal
//!
//! Temporal versioning engine for Vestige.
//! Time-travel queries with a rewritten temporal predicate per joined table,
//! the clone-on-write mutation protocol, version navigation, versioned to-one
//! and many-to-many relationships, and the cascading soft-delete collector.

pub mod decode;
pub mod deletion;
pub mod engine;
pub mod mutation;
pub mod navigation;
pub mod query;
pub mod relations;

pub use deletion::{CollectorRegistry, DefaultCollectorHooks, ICollectorHooks};
pub use engine::VersionEngine;
pub use navigation::RelationsAsOf;
pub use query::{Filter, VersionedQuery};
