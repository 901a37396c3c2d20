use super::StorageError;

/// Top-level error type for the versioning engine.
/// Storage errors convert into this via `From`.
#[derive(Debug, thiserror::Error)]
pub enum VestigeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("version {key} of {entity} is already terminated")]
    AlreadyTerminated { entity: String, key: String },

    #[error("restoring {entity} requires a value for reference `{reference}`")]
    ForeignKeyRequiresValue { entity: String, reference: String },

    #[error("{entity} not found: {detail}")]
    ObjectNotFound { entity: String, detail: String },

    #[error("ambiguous version of {entity}: {detail}")]
    AmbiguousVersion { entity: String, detail: String },

    #[error("cannot delete {entity} {identity}: referenced through protected `{referrer}.{reference}`")]
    ProtectedReference {
        entity: String,
        identity: String,
        referrer: String,
        reference: String,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown field `{field}` on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias.
pub type VestigeResult<T> = Result<T, VestigeError>;
