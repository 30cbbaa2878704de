//! Connection handling for ledger files.
//!
//! Writers take a per-file mutex, so one unit of work runs at a time in this
//! process, and run inside `BEGIN IMMEDIATE` against other processes. Readers
//! take no lock and rely on WAL. Every call opens its own connection.

use crate::core::db;
use crate::core::error::LedgerError;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::debug;

/// How long a writer waits on another process's lock.
const WRITE_BUSY_TIMEOUT_SECS: u64 = 30;
/// How long a reader waits on a checkpoint.
const READ_BUSY_TIMEOUT_SECS: u64 = 15;

/// Write lock for one ledger file.
struct LedgerLock {
    write_lock: Mutex<()>,
    db_path: PathBuf,
}

pub struct SqlitePool {
    ledgers: Mutex<HashMap<PathBuf, &'static LedgerLock>>,
}

impl SqlitePool {
    fn new() -> Self {
        Self {
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    fn get_entry(&self, db_path: &Path) -> Result<&'static LedgerLock, LedgerError> {
        let key = db_path.to_path_buf();
        let mut ledgers = self.ledgers.lock().map_err(|_| {
            LedgerError::ValidationError("SqlitePool ledgers lock poisoned".to_string())
        })?;
        if let Some(entry) = ledgers.get(&key) {
            return Ok(*entry);
        }
        // Entries live for the whole process, one per distinct ledger file.
        let entry = Box::leak(Box::new(LedgerLock {
            write_lock: Mutex::new(()),
            db_path: key.clone(),
        }));
        ledgers.insert(key, entry);
        Ok(entry)
    }

    /// Run `f` as one unit of work: all of its statements commit together, or
    /// none do if it returns an error.
    pub fn with_write<F, R>(&self, db_path: &Path, op_name: &str, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError>,
    {
        let entry = self.get_entry(db_path)?;
        let _guard = entry
            .write_lock
            .lock()
            .map_err(|_| LedgerError::ValidationError("Pool write lock poisoned".to_string()))?;

        let mut conn = db::db_connect(&entry.db_path, WRITE_BUSY_TIMEOUT_SECS)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Dropping `tx` on the error path rolls back.
        let value = f(&tx)?;
        tx.commit()?;
        debug!(op = op_name, "ledger unit of work committed");
        Ok(value)
    }

    /// Run `f` on a fresh read connection.
    pub fn with_read<F, R>(&self, db_path: &Path, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError>,
    {
        let conn = db::db_connect(db_path, READ_BUSY_TIMEOUT_SECS)?;
        f(&conn)
    }
}

/// Process-wide pool shared by every [`crate::core::ledger::Ledger`].
pub fn global_pool() -> &'static SqlitePool {
    static POOL: OnceLock<SqlitePool> = OnceLock::new();
    POOL.get_or_init(SqlitePool::new)
}
