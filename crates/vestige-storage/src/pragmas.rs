//! SQLite PRAGMA configuration applied to every connection right after opening.

use std::time::Duration;

use rusqlite::Connection;

use vestige_core::config::StorageConfig;
use vestige_core::VestigeResult;

use crate::map_sqlite_err;

/// Apply the production PRAGMAs.
///
/// WAL is only requested for file-backed databases; in-memory databases
/// always report `memory`.
pub fn configure_connection(conn: &Connection, config: &StorageConfig) -> VestigeResult<()> {
    if config.journal_wal && config.path.is_some() {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(map_sqlite_err)?;
    }
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = OFF;
        PRAGMA cache_size = -8000;
        PRAGMA temp_store = MEMORY;
        ",
    )
    .map_err(map_sqlite_err)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(map_sqlite_err)?;
    Ok(())
}
