//! Time-travel queries.
//!
//! A [`VersionedQuery`] carries its [`QueryTime`](vestige_core::QueryTime)
//! until it is compiled; the temporal predicate for the base table is added
//! last, and every joined hop gets its own.

mod builder;
mod filter;
mod lookup;

pub use builder::VersionedQuery;
pub use filter::Filter;
