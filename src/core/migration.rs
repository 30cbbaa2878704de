//! Schema version detection and migration for the location ledger.
//!
//! The applied version lives in `PRAGMA user_version`. Migrations are listed
//! in order, run inside the caller's transaction, and must be idempotent.

use crate::core::error::LedgerError;
use crate::core::schemas;
use rusqlite::Connection;
use tracing::info;

/// Migration definition
pub struct Migration {
    /// Schema version this migration produces.
    pub version: i64,
    /// Human-readable description
    pub description: &'static str,
    /// Migration function
    pub up: fn(&Connection) -> Result<(), LedgerError>,
}

/// All migrations in chronological order
pub fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Create visit, dataset and unknown_dataset tables with status lookup indexes",
        up: create_initial_schema,
    }]
}

pub fn latest_version() -> i64 {
    all_migrations().last().map(|m| m.version).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> Result<i64, LedgerError> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Bring the schema up to date. Returns the number of migrations applied.
pub fn migrate(conn: &Connection) -> Result<usize, LedgerError> {
    let found = current_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(LedgerError::SchemaTooNew { found, supported });
    }

    let mut applied = 0;
    for migration in all_migrations() {
        if migration.version <= found {
            continue;
        }
        info!(
            version = migration.version,
            "applying ledger migration: {}", migration.description
        );
        (migration.up)(conn)?;
        // PRAGMA does not accept bound parameters.
        conn.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        applied += 1;
    }
    Ok(applied)
}

fn create_initial_schema(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute(schemas::VISIT_SCHEMA, [])?;
    conn.execute(schemas::DATASET_SCHEMA, [])?;
    conn.execute(schemas::UNKNOWN_DATASET_SCHEMA, [])?;
    for index in schemas::DATASET_LOOKUP_INDEXES {
        conn.execute(index, [])?;
    }
    Ok(())
}
