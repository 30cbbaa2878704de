//! The location ledger: schema owner and unit-of-work entry point.
//!
//! All rows are owned here. Ingestion and transfer reconciliation write
//! through [`Ledger::with_write`]; everything else only reads.

use crate::core::db;
use crate::core::error::LedgerError;
use crate::core::migration;
use crate::core::model::{
    DatasetLocationStatus, DatasetOrigin, DatasetRecord, LocationStatuses, RepositoryRole,
    UnknownDatasetRecord, VisitRecord,
};
use crate::core::pool;
use crate::core::schemas;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub datasets: u64,
    pub visits: u64,
    pub unknown_datasets: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub role: RepositoryRole,
    pub status: DatasetLocationStatus,
    pub count: u64,
}

impl Ledger {
    /// Open the ledger named by `uri` and bring its schema up to date.
    pub fn open(uri: &str) -> Result<Self, LedgerError> {
        let ledger = Self::at_path(db::ledger_path_from_uri(uri)?);
        ledger.initialize()?;
        Ok(ledger)
    }

    /// Handle to a ledger file without touching it.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create tables and indexes if they do not exist yet. Returns the number
    /// of migrations applied.
    pub fn initialize(&self) -> Result<usize, LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let applied = self.with_write("ledger.init", migration::migrate)?;
        if applied > 0 {
            info!(path = %self.path.display(), applied, "ledger schema initialized");
        }
        Ok(applied)
    }

    pub fn with_write<F, R>(&self, op_name: &str, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError>,
    {
        pool::global_pool().with_write(&self.path, op_name, f)
    }

    pub fn with_read<F, R>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError>,
    {
        pool::global_pool().with_read(&self.path, f)
    }

    pub fn dataset(&self, id: Uuid) -> Result<Option<DatasetRecord>, LedgerError> {
        self.with_read(|conn| {
            let sql = format!("{} WHERE id = ?1", schemas::SELECT_DATASET_COLUMNS);
            let raw = conn
                .query_row(&sql, params![id_to_db(&id)], RawDataset::from_row)
                .optional()?;
            raw.map(RawDataset::into_record).transpose()
        })
    }

    /// Every dataset row, ordered by (dataset_type, visit, id).
    pub fn datasets(&self) -> Result<Vec<DatasetRecord>, LedgerError> {
        self.with_read(|conn| {
            let sql = format!(
                "{} ORDER BY dataset_type, visit, id",
                schemas::SELECT_DATASET_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], RawDataset::from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?.into_record()?);
            }
            Ok(out)
        })
    }

    pub fn visits(&self) -> Result<Vec<VisitRecord>, LedgerError> {
        self.with_read(|conn| {
            let mut stmt =
                conn.prepare("SELECT instrument, visit, time FROM visit ORDER BY instrument, visit")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;
            let mut out = Vec::new();
            for r in rows {
                let (instrument, visit, time) = r?;
                out.push(VisitRecord {
                    instrument,
                    visit,
                    end_time: time.as_deref().map(time::from_db_time).transpose()?,
                });
            }
            Ok(out)
        })
    }

    pub fn unknown_datasets(&self) -> Result<Vec<UnknownDatasetRecord>, LedgerError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT id, origin, error FROM unknown_dataset ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, DatasetOrigin>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            let mut out = Vec::new();
            for r in rows {
                let (id, origin, error) = r?;
                out.push(UnknownDatasetRecord {
                    id: id_from_db(&id)?,
                    origin,
                    error,
                });
            }
            Ok(out)
        })
    }

    pub fn counts(&self) -> Result<LedgerCounts, LedgerError> {
        self.with_read(|conn| {
            let count = |table: &str| -> Result<u64, LedgerError> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };
            Ok(LedgerCounts {
                datasets: count("dataset")?,
                visits: count("visit")?,
                unknown_datasets: count("unknown_dataset")?,
            })
        })
    }

    /// Dataset counts for every (repository, status) pair that occurs.
    pub fn status_summary(&self) -> Result<Vec<StatusCount>, LedgerError> {
        self.with_read(|conn| {
            let mut out = Vec::new();
            for role in RepositoryRole::ALL {
                let column = role.status_column();
                let sql = format!(
                    "SELECT {column}, COUNT(*) FROM dataset GROUP BY {column} ORDER BY {column}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, DatasetLocationStatus>(0)?, row.get::<_, i64>(1)?))
                })?;
                for r in rows {
                    let (status, count) = r?;
                    out.push(StatusCount {
                        role,
                        status,
                        count: count as u64,
                    });
                }
            }
            Ok(out)
        })
    }
}

pub(crate) fn id_to_db(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

pub(crate) fn id_from_db(s: &str) -> Result<Uuid, LedgerError> {
    Uuid::parse_str(s).map_err(|e| LedgerError::InvalidValue(format!("dataset id '{}': {}", s, e)))
}

/// Row as stored, before ids and timestamps are parsed.
struct RawDataset {
    id: String,
    origin: DatasetOrigin,
    dataset_type: String,
    instrument: Option<String>,
    visit: Option<i64>,
    statuses: LocationStatuses,
    times: [Option<String>; RepositoryRole::ALL.len()],
}

impl RawDataset {
    // Column order follows schemas::SELECT_DATASET_COLUMNS.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut statuses = LocationStatuses::default();
        for (offset, role) in RepositoryRole::ALL.into_iter().enumerate() {
            statuses.set(role, row.get(5 + offset)?);
        }
        let mut times: [Option<String>; RepositoryRole::ALL.len()] = Default::default();
        for (offset, role) in RepositoryRole::ALL[1..].iter().enumerate() {
            times[role.index()] = row.get(10 + offset)?;
        }
        Ok(Self {
            id: row.get(0)?,
            origin: row.get(1)?,
            dataset_type: row.get(2)?,
            instrument: row.get(3)?,
            visit: row.get(4)?,
            statuses,
            times,
        })
    }

    fn into_record(self) -> Result<DatasetRecord, LedgerError> {
        let mut release_times = [None; RepositoryRole::ALL.len()];
        for (slot, raw) in release_times.iter_mut().zip(self.times.iter()) {
            *slot = raw.as_deref().map(time::from_db_time).transpose()?;
        }
        Ok(DatasetRecord {
            id: id_from_db(&self.id)?,
            origin: self.origin,
            dataset_type: self.dataset_type,
            instrument: self.instrument,
            visit: self.visit,
            statuses: self.statuses,
            release_times,
        })
    }
}
