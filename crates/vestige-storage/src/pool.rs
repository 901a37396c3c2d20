//! ConnectionPool: the single writer connection and its transaction depth.
//!
//! The only place in this crate that holds `Mutex<Connection>`. Every
//! statement, including reads, goes through the writer so that reads issued
//! inside an open transaction observe its uncommitted writes.
//!
//! An open transaction belongs to the thread that began it. Other threads
//! wait in [`ConnectionPool::with_writer`] until it commits or rolls back, so
//! they never run statements inside somebody else's transaction.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use rusqlite::Connection;
use tracing::{debug, warn};

use vestige_core::config::StorageConfig;
use vestige_core::errors::StorageError;
use vestige_core::{VestigeError, VestigeResult};

use crate::{map_sqlite_err, pragmas};

/// The writer connection plus the number of open (nested) transactions.
pub struct Writer {
    pub conn: Connection,
    depth: usize,
    owner: Option<ThreadId>,
}

impl Writer {
    /// Whether a transaction of another thread is open.
    fn busy_for(&self, thread: ThreadId) -> bool {
        self.owner.is_some_and(|owner| owner != thread)
    }

    /// Bookkeeping after a commit or rollback that closed a level.
    fn closed_level(&mut self) {
        if self.depth == 0 {
            self.owner = None;
        }
    }
}

pub struct ConnectionPool {
    writer: Mutex<Writer>,
    /// Signalled when the outermost transaction ends.
    released: Condvar,
}

impl ConnectionPool {
    /// Open per config: a file when `path` is set, otherwise in-memory.
    pub fn open(config: &StorageConfig) -> VestigeResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path).map_err(|e| {
                VestigeError::Config(format!("failed to open {}: {e}", path.display()))
            })?,
            None => Connection::open_in_memory().map_err(|e| {
                VestigeError::Config(format!("failed to open in-memory database: {e}"))
            })?,
        };
        pragmas::configure_connection(&conn, config)?;
        debug!(path = ?config.path, "opened writer connection");
        Ok(Self {
            writer: Mutex::new(Writer {
                conn,
                depth: 0,
                owner: None,
            }),
            released: Condvar::new(),
        })
    }

    /// Lock the writer once no other thread holds a transaction open.
    fn acquire(&self) -> VestigeResult<MutexGuard<'_, Writer>> {
        let me = thread::current().id();
        let writer = self
            .writer
            .lock()
            .map_err(|e| VestigeError::Storage(StorageError::LockPoisoned(e.to_string())))?;
        self.released
            .wait_while(writer, |w| w.busy_for(me))
            .map_err(|e| VestigeError::Storage(StorageError::LockPoisoned(e.to_string())))
    }

    /// Execute a closure with the writer connection.
    pub fn with_writer<F, T>(&self, f: F) -> VestigeResult<T>
    where
        F: FnOnce(&mut Writer) -> VestigeResult<T>,
    {
        let mut writer = self.acquire()?;
        f(&mut writer)
    }

    /// Run `f` with the writer, then wake waiting threads if the outermost
    /// transaction is no longer open.
    fn end_level<F>(&self, f: F) -> VestigeResult<()>
    where
        F: FnOnce(&mut Writer) -> VestigeResult<()>,
    {
        let mut writer = self.acquire()?;
        let result = f(&mut writer);
        let released = writer.owner.is_none();
        drop(writer);
        if released {
            self.released.notify_all();
        }
        result
    }

    pub fn depth(&self) -> VestigeResult<usize> {
        self.with_writer(|w| Ok(w.depth))
    }

    /// `BEGIN IMMEDIATE` at depth 0, a savepoint otherwise.
    pub fn begin(&self) -> VestigeResult<()> {
        self.with_writer(|w| {
            let sql = if w.depth == 0 {
                "BEGIN IMMEDIATE".to_string()
            } else {
                format!("SAVEPOINT sp_{}", w.depth)
            };
            w.conn.execute_batch(&sql).map_err(map_sqlite_err)?;
            if w.depth == 0 {
                w.owner = Some(thread::current().id());
            }
            w.depth += 1;
            debug!(depth = w.depth, "transaction opened");
            Ok(())
        })
    }

    /// A failed commit leaves the level open so the caller can roll it back.
    pub fn commit(&self) -> VestigeResult<()> {
        self.end_level(|w| {
            if w.depth == 0 {
                return Err(StorageError::NoTransaction.into());
            }
            let sql = if w.depth == 1 {
                "COMMIT".to_string()
            } else {
                format!("RELEASE SAVEPOINT sp_{}", w.depth - 1)
            };
            w.conn.execute_batch(&sql).map_err(map_sqlite_err)?;
            w.depth -= 1;
            w.closed_level();
            debug!(depth = w.depth, "transaction committed");
            Ok(())
        })
    }

    pub fn rollback(&self) -> VestigeResult<()> {
        self.end_level(|w| {
            if w.depth == 0 {
                return Err(StorageError::NoTransaction.into());
            }
            w.depth -= 1;
            let sql = if w.depth == 0 {
                "ROLLBACK".to_string()
            } else {
                format!(
                    "ROLLBACK TO SAVEPOINT sp_{0}; RELEASE SAVEPOINT sp_{0}",
                    w.depth
                )
            };
            let result = w.conn.execute_batch(&sql).map_err(map_sqlite_err);
            w.closed_level();
            result?;
            warn!(depth = w.depth, "transaction rolled back");
            Ok(())
        })
    }
}
