//! # vestige-storage
//!
//! SQLite storage collaborator for the Vestige versioning engine.
//! Implements `IVersionStorage`: renders the statement AST (including the
//! temporal predicate node) to SQL, runs it on a single writer connection
//! with savepoint-based nested transactions, and bootstraps catalog schemas.

pub mod bootstrap;
pub mod codec;
pub mod engine;
pub mod pool;
pub mod pragmas;
pub mod render;

pub use engine::StorageEngine;

use vestige_core::errors::StorageError;
use vestige_core::VestigeError;

/// Helper to convert a string message into a `VestigeError::Storage`.
pub fn to_storage_err(msg: String) -> VestigeError {
    VestigeError::Storage(StorageError::SqliteError { message: msg })
}

/// Map a rusqlite error, keeping constraint violations distinguishable.
pub fn map_sqlite_err(err: rusqlite::Error) -> VestigeError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            VestigeError::Storage(StorageError::ConstraintViolation {
                message: err.to_string(),
            })
        }
        _ => to_storage_err(err.to_string()),
    }
}
