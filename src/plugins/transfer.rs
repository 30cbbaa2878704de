//! Transfer-and-reconcile: copy eligible datasets one hop down the pipeline
//! and record exactly what happened in the ledger.
//!
//! Candidates are processed in fixed-size batches. Each batch is reconciled in
//! its own unit of work, so an interrupted run keeps every batch that already
//! committed and the next run's candidate query skips them.

use crate::core::error::LedgerError;
use crate::core::ledger::{Ledger, id_to_db};
use crate::core::model::{DatasetLocationStatus, Hop};
use crate::core::time;
use crate::plugins::eligibility::{
    MAX_CANDIDATES, find_publication_candidates, find_release_candidates,
};
use crate::plugins::policy::PolicyTable;
use crate::store::DatasetStore;
use chrono::{DateTime, Utc};
use rusqlite::params;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub const TRANSFER_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub batch_size: usize,
    pub max_candidates: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_size: TRANSFER_BATCH_SIZE,
            max_candidates: MAX_CANDIDATES,
        }
    }
}

/// Outcome of one batch, classified per dataset id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTransferResult {
    /// Not known to the source registry at all.
    pub missing_registry: Vec<Uuid>,
    /// Known to the source registry, but its artifact could not be copied.
    pub missing_datastore: Vec<Uuid>,
    /// Now present in the target repository.
    pub transferred: Vec<Uuid>,
}

impl DatasetTransferResult {
    pub fn missing(&self) -> impl Iterator<Item = &Uuid> {
        self.missing_registry.iter().chain(&self.missing_datastore)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub batches: usize,
    pub candidates: usize,
    pub transferred: usize,
    pub missing_registry: usize,
    pub missing_datastore: usize,
}

impl TransferReport {
    fn absorb(&mut self, result: &DatasetTransferResult) {
        self.batches += 1;
        self.transferred += result.transferred.len();
        self.missing_registry += result.missing_registry.len();
        self.missing_datastore += result.missing_datastore.len();
    }
}

/// Move every dataset whose embargo has expired from embargo to prompt_prep.
pub fn unembargo_datasets(
    policy: &PolicyTable,
    source: &dyn DatasetStore,
    target: &dyn DatasetStore,
    ledger: &Ledger,
    settings: &TransferSettings,
) -> Result<TransferReport, LedgerError> {
    let candidates = find_release_candidates(policy, ledger, Utc::now(), settings.max_candidates)?;
    transfer_in_batches(Hop::UNEMBARGO, &candidates, source, target, ledger, settings)
}

/// Move public datasets from prompt_prep to a downstream repository.
pub fn publish_datasets(
    policy: &PolicyTable,
    hop: Hop,
    source: &dyn DatasetStore,
    target: &dyn DatasetStore,
    ledger: &Ledger,
    settings: &TransferSettings,
) -> Result<TransferReport, LedgerError> {
    let candidates = find_publication_candidates(policy, ledger, hop, settings.max_candidates)?;
    transfer_in_batches(hop, &candidates, source, target, ledger, settings)
}

fn transfer_in_batches(
    hop: Hop,
    candidates: &[Uuid],
    source: &dyn DatasetStore,
    target: &dyn DatasetStore,
    ledger: &Ledger,
    settings: &TransferSettings,
) -> Result<TransferReport, LedgerError> {
    let span = info_span!("transfer", %hop, source = source.name(), target = target.name());
    let _enter = span.enter();

    let mut report = TransferReport {
        candidates: candidates.len(),
        ..TransferReport::default()
    };
    info!(candidates = candidates.len(), "starting transfer");

    for batch in candidates.chunks(settings.batch_size.max(1)) {
        let result = transfer_datasets(source, target, batch)?;
        record_transfer_result(ledger, &result, hop, Utc::now())?;
        report.absorb(&result);
        info!(
            batch = report.batches,
            transferred = result.transferred.len(),
            missing_registry = result.missing_registry.len(),
            missing_datastore = result.missing_datastore.len(),
            "batch reconciled"
        );
    }

    info!(
        batches = report.batches,
        transferred = report.transferred,
        missing = report.missing_registry + report.missing_datastore,
        "transfer complete"
    );
    Ok(report)
}

/// Copy `dataset_ids` from `source` to `target` and classify each id.
pub fn transfer_datasets(
    source: &dyn DatasetStore,
    target: &dyn DatasetStore,
    dataset_ids: &[Uuid],
) -> Result<DatasetTransferResult, LedgerError> {
    let mut requested = FxHashSet::default();
    let dataset_ids: Vec<Uuid> = dataset_ids
        .iter()
        .copied()
        .filter(|id| requested.insert(*id))
        .collect();

    let datasets = source.resolve(&dataset_ids)?;
    let found: FxHashSet<Uuid> = datasets.iter().map(|d| d.id).collect();
    let missing_registry: Vec<Uuid> = dataset_ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    if !missing_registry.is_empty() {
        warn!(
            "Datasets were not found in source registry: {:?}",
            missing_registry
        );
    }

    let completed = if datasets.is_empty() {
        Vec::new()
    } else {
        target.transfer_from(source, &datasets, true)?
    };
    let completed_ids: FxHashSet<Uuid> = completed.iter().map(|d| d.id).collect();

    let missing_datastore: Vec<Uuid> = datasets
        .iter()
        .map(|d| d.id)
        .filter(|id| !completed_ids.contains(id))
        .collect();
    if !missing_datastore.is_empty() {
        warn!(
            "Datasets were not found in source datastore: {:?}",
            missing_datastore
        );
    }

    // Keep request order so ledger updates are deterministic.
    let transferred = dataset_ids
        .iter()
        .copied()
        .filter(|id| completed_ids.contains(id))
        .collect();

    Ok(DatasetTransferResult {
        missing_registry,
        missing_datastore,
        transferred,
    })
}

/// Reconcile one batch in a single unit of work: missing datasets are marked
/// MISSING at the hop's source, then transferred datasets are marked PRESENT
/// at its target and stamped with `transfer_time`.
pub fn record_transfer_result(
    ledger: &Ledger,
    result: &DatasetTransferResult,
    hop: Hop,
    transfer_time: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let missing_sql = format!(
        "UPDATE dataset SET {} = ?1 WHERE id = ?2",
        hop.source.status_column()
    );
    let transferred_sql = match hop.target.release_time_column() {
        Some(time_column) => format!(
            "UPDATE dataset SET {} = ?1, {} = ?2 WHERE id = ?3",
            hop.target.status_column(),
            time_column
        ),
        None => format!(
            "UPDATE dataset SET {} = ?1 WHERE id = ?3",
            hop.target.status_column()
        ),
    };
    let stamp = time::to_db_time(&transfer_time);

    ledger.with_write("transfer.reconcile", |conn| {
        let mut stmt = conn.prepare_cached(&missing_sql)?;
        for id in result.missing() {
            stmt.execute(params![DatasetLocationStatus::Missing, id_to_db(id)])?;
        }

        let mut stmt = conn.prepare_cached(&transferred_sql)?;
        for id in &result.transferred {
            stmt.execute(params![DatasetLocationStatus::Present, stamp, id_to_db(id)])?;
        }
        Ok(())
    })
}
