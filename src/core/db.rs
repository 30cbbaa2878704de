use crate::core::error::LedgerError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn db_connect(db_path: &Path, busy_timeout_secs: u64) -> Result<Connection, LedgerError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

/// Resolve a ledger connection string to the SQLite file it names.
///
/// Accepts `sqlite:///abs/path`, `sqlite://rel/path`, `sqlite:path` and bare
/// paths. Any other `scheme://` is rejected; only SQLite is wired up.
pub fn ledger_path_from_uri(uri: &str) -> Result<PathBuf, LedgerError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(LedgerError::ValidationError(
            "ledger connection string is empty".to_string(),
        ));
    }

    if let Some((scheme, rest)) = uri.split_once("://") {
        // Drivers are spelled like `sqlite+aiosqlite` in some deployments.
        let engine = scheme.split('+').next().unwrap_or(scheme);
        if engine != "sqlite" {
            return Err(LedgerError::UnsupportedDatabase(engine.to_string()));
        }
        // sqlite:///abs/path keeps its leading slash after the authority.
        return Ok(PathBuf::from(rest));
    }

    if let Some(rest) = uri.strip_prefix("sqlite:") {
        return Ok(PathBuf::from(rest));
    }

    Ok(PathBuf::from(uri))
}
