//! Storage collaborator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Use WAL journaling for file-backed databases.
    pub journal_wal: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
            journal_wal: true,
        }
    }
}
