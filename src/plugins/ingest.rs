//! Registration of embargoed datasets in the location ledger.
//!
//! Upstream producers deliver at least once, so every write here is an
//! insert-if-absent: replaying a batch, or any overlapping batch, leaves rows
//! that already exist untouched.

use crate::core::error::LedgerError;
use crate::core::ledger::{Ledger, id_to_db};
use crate::core::model::{DatasetLocationStatus, DatasetOrigin, UnknownDatasetRecord, VisitKey};
use crate::core::schemas;
use crate::core::time;
use crate::store::{DatasetHandle, DatasetStore};
use chrono::{DateTime, Utc};
use rusqlite::params;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// A batch of dataset ids handed over by an upstream producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetBatch {
    pub batch_id: String,
    pub datasets: Vec<Uuid>,
}

impl DatasetBatch {
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Resolved datasets handed to the ledger.
    pub datasets_seen: usize,
    /// Dataset rows that did not exist before this call.
    pub datasets_inserted: usize,
    /// Visit rows created, or given their first known end time.
    pub visits_inserted: usize,
    /// Ids that could not be found in the source repository.
    pub unknown: Vec<Uuid>,
    pub unknown_inserted: usize,
}

struct DatasetRow {
    id: Uuid,
    dataset_type: String,
    instrument: Option<String>,
    visit: Option<i64>,
}

struct VisitRow {
    key: VisitKey,
    end_time: Option<DateTime<Utc>>,
}

/// Register datasets already resolved against `source`.
pub fn register_embargo_datasets(
    ledger: &Ledger,
    origin: DatasetOrigin,
    source: &dyn DatasetStore,
    datasets: &[DatasetHandle],
) -> Result<IngestReport, LedgerError> {
    register(ledger, origin, source, datasets, Vec::new())
}

/// Resolve a batch of ids against `source` and register what was found.
///
/// Ids missing upstream are recorded in `unknown_dataset` with a reason naming
/// the batch, and reported with a single warning.
pub fn register_dataset_batch(
    ledger: &Ledger,
    origin: DatasetOrigin,
    source: &dyn DatasetStore,
    batch: &DatasetBatch,
) -> Result<IngestReport, LedgerError> {
    if batch.datasets.is_empty() {
        return Ok(IngestReport::default());
    }

    let mut seen = FxHashSet::default();
    let requested: Vec<Uuid> = batch
        .datasets
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();
    let datasets = source.resolve(&requested)?;
    let found: FxHashSet<Uuid> = datasets.iter().map(|d| d.id).collect();
    let missing: Vec<Uuid> = requested
        .into_iter()
        .filter(|id| !found.contains(id))
        .collect();

    let mut unknown = Vec::with_capacity(missing.len());
    if !missing.is_empty() {
        let ids: Vec<String> = missing.iter().map(Uuid::to_string).collect();
        warn!(
            batch_id = %batch.batch_id,
            source = source.name(),
            "{} dataset(s) not found in source repository: {}",
            missing.len(),
            ids.join(", ")
        );
        for id in missing {
            unknown.push(UnknownDatasetRecord {
                id,
                origin,
                error: format!(
                    "Dataset was not found in the source repository while processing batch '{}'",
                    batch.batch_id
                ),
            });
        }
    }

    register(ledger, origin, source, &datasets, unknown)
}

pub fn register_dataset_batch_file(
    ledger: &Ledger,
    origin: DatasetOrigin,
    source: &dyn DatasetStore,
    batch_file: &Path,
) -> Result<IngestReport, LedgerError> {
    let batch = DatasetBatch::load(batch_file)?;
    info!(
        batch_id = %batch.batch_id,
        datasets = batch.datasets.len(),
        "registering dataset batch"
    );
    register_dataset_batch(ledger, origin, source, &batch)
}

fn register(
    ledger: &Ledger,
    origin: DatasetOrigin,
    source: &dyn DatasetStore,
    datasets: &[DatasetHandle],
    unknown: Vec<UnknownDatasetRecord>,
) -> Result<IngestReport, LedgerError> {
    if datasets.is_empty() && unknown.is_empty() {
        return Ok(IngestReport::default());
    }

    // Shape errors must surface before anything is written.
    let dataset_rows = datasets
        .iter()
        .map(convert_handle_to_dataset_row)
        .collect::<Result<Vec<_>, _>>()?;
    let visit_rows = find_matching_visits(source, datasets)?;

    let (visits_inserted, unknown_inserted, datasets_inserted) =
        ledger.with_write("ingest.register", |conn| {
            let mut visits_inserted = 0;
            let mut stmt = conn.prepare_cached(schemas::INSERT_VISIT)?;
            for row in &visit_rows {
                visits_inserted += stmt.execute(params![
                    row.key.visit,
                    row.key.instrument,
                    row.end_time.as_ref().map(time::to_db_time),
                ])?;
            }

            let mut unknown_inserted = 0;
            let mut stmt = conn.prepare_cached(schemas::INSERT_UNKNOWN_DATASET)?;
            for row in &unknown {
                unknown_inserted += stmt.execute(params![id_to_db(&row.id), row.origin, row.error])?;
            }

            let mut datasets_inserted = 0;
            let mut stmt = conn.prepare_cached(schemas::INSERT_DATASET)?;
            for row in &dataset_rows {
                datasets_inserted += stmt.execute(params![
                    id_to_db(&row.id),
                    origin,
                    row.dataset_type,
                    row.instrument,
                    row.visit,
                    DatasetLocationStatus::Present,
                ])?;
            }
            Ok((visits_inserted, unknown_inserted, datasets_inserted))
        })?;

    let report = IngestReport {
        datasets_seen: dataset_rows.len(),
        datasets_inserted,
        visits_inserted,
        unknown: unknown.into_iter().map(|u| u.id).collect(),
        unknown_inserted,
    };
    info!(
        datasets = report.datasets_seen,
        new_datasets = report.datasets_inserted,
        new_visits = report.visits_inserted,
        unknown = report.unknown.len(),
        "registered embargo datasets"
    );
    Ok(report)
}

/// Timing rows for every visit referenced by `datasets`, one per (instrument, visit).
fn find_matching_visits(
    source: &dyn DatasetStore,
    datasets: &[DatasetHandle],
) -> Result<Vec<VisitRow>, LedgerError> {
    let keys: BTreeSet<VisitKey> = datasets.iter().filter_map(DatasetHandle::visit_key).collect();
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut end_times: BTreeMap<VisitKey, Option<DateTime<Utc>>> = source
        .visit_timespans(&keys)?
        .into_iter()
        .filter(|timing| keys.contains(&timing.key))
        .map(|timing| {
            let end = timing.timespan.and_then(|span| span.definite_end());
            (timing.key, end)
        })
        .collect();

    let unrecorded: Vec<&VisitKey> = keys.iter().filter(|k| !end_times.contains_key(k)).collect();
    if !unrecorded.is_empty() {
        // The dataset rows reference these visits, so they are still written
        // with an unknown end time, filled in by a later ingest.
        warn!(
            source = source.name(),
            "no timing record for {} visit(s): {:?}",
            unrecorded.len(),
            unrecorded
        );
    }

    Ok(keys
        .into_iter()
        .map(|key| {
            let end_time = end_times.remove(&key).flatten();
            VisitRow { key, end_time }
        })
        .collect())
}

fn convert_handle_to_dataset_row(handle: &DatasetHandle) -> Result<DatasetRow, LedgerError> {
    // TODO: exposure-level datasets need their own timing and "can see sky"
    // tracking before they can be registered.
    if handle.has_dimension("exposure") {
        return Err(LedgerError::NotImplemented(format!(
            "Dataset type '{}' with exposure dimensions cannot yet be imported.",
            handle.dataset_type
        )));
    }

    let instrument = if handle.has_dimension("instrument") || handle.has_dimension("visit") {
        handle.instrument().map(str::to_string)
    } else {
        None
    };
    let visit = if handle.has_dimension("visit") {
        handle.visit()
    } else {
        None
    };

    Ok(DatasetRow {
        id: handle.id,
        dataset_type: handle.dataset_type.clone(),
        instrument,
        visit,
    })
}
