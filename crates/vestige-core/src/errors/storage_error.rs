//! Storage-layer errors raised by the backing relational store.

/// Errors that can occur in the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("connection lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("no transaction in progress")]
    NoTransaction,

    #[error("cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },

    #[error("schema bootstrap failed for {table}: {reason}")]
    BootstrapFailed { table: String, reason: String },
}
