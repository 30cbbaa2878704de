//! A repository described by a JSON manifest.
//!
//! The manifest is the registry: dataset types with their dimensions, visit
//! timing records, and datasets with the collection they were written to and
//! whether their artifact is stored. Transfers copy registry entries only.

use super::{DatasetHandle, DatasetStore, DataIdValue, StoreError, Timespan, VisitTiming};
use crate::core::model::VisitKey;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Dataset type name -> dimension names.
    #[serde(default)]
    pub dataset_types: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub visits: Vec<ManifestVisit>,
    #[serde(default)]
    pub datasets: Vec<ManifestDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestVisit {
    pub instrument: String,
    pub visit: i64,
    #[serde(default)]
    pub timespan: Option<Timespan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDataset {
    pub id: Uuid,
    pub dataset_type: String,
    pub collection: String,
    #[serde(default)]
    pub data_id: BTreeMap<String, DataIdValue>,
    /// False when the registry knows the dataset but its artifact is gone.
    #[serde(default = "default_stored")]
    pub stored: bool,
}

fn default_stored() -> bool {
    true
}

fn read_manifest(path: &Path) -> Result<Manifest, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Manifest {
        path: path.display().to_string(),
        source,
    })
}

pub struct ManifestStore {
    label: String,
    path: Option<PathBuf>,
    manifest: Mutex<Manifest>,
}

impl ManifestStore {
    /// Load a file-backed repository. A missing file is an empty repository
    /// that is created on the first transfer into it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let manifest = if path.exists() {
            read_manifest(&path)?
        } else {
            Manifest::default()
        };
        Ok(Self::at(path, manifest))
    }

    /// Load a file-backed repository that must already exist. Source
    /// repositories are opened this way so a bad path is an I/O error rather
    /// than a repository in which every dataset is missing.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let manifest = read_manifest(&path)?;
        Ok(Self::at(path, manifest))
    }

    fn at(path: PathBuf, manifest: Manifest) -> Self {
        Self {
            label: path.display().to_string(),
            path: Some(path),
            manifest: Mutex::new(manifest),
        }
    }

    pub fn in_memory(label: impl Into<String>, manifest: Manifest) -> Self {
        Self {
            label: label.into(),
            path: None,
            manifest: Mutex::new(manifest),
        }
    }

    /// Copy of the current registry contents.
    pub fn snapshot(&self) -> Manifest {
        self.lock().clone()
    }

    /// Apply `f` to the registry, persisting the result if file-backed.
    pub fn update<R>(&self, f: impl FnOnce(&mut Manifest) -> R) -> Result<R, StoreError> {
        let mut manifest = self.lock();
        let value = f(&mut manifest);
        self.save(&manifest)?;
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, Manifest> {
        // A panic mid-update cannot leave the manifest half-written on disk, so
        // the in-memory copy is still usable.
        self.manifest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let display = path.display().to_string();
        let content = serde_json::to_string_pretty(manifest).map_err(|source| {
            StoreError::Manifest {
                path: display.clone(),
                source,
            }
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: display.clone(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| StoreError::Io {
            path: display,
            source,
        })
    }

    fn to_handle(manifest: &Manifest, dataset: &ManifestDataset) -> DatasetHandle {
        DatasetHandle {
            id: dataset.id,
            dataset_type: dataset.dataset_type.clone(),
            collection: dataset.collection.clone(),
            dimensions: manifest
                .dataset_types
                .get(&dataset.dataset_type)
                .cloned()
                .unwrap_or_default(),
            data_id: dataset.data_id.clone(),
        }
    }
}

/// Turn `*`-style globs into one anchored alternation.
fn compile_type_patterns(patterns: &[String]) -> Result<Option<Regex>, StoreError> {
    let globs: Vec<&str> = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if globs.is_empty() || globs.contains(&"*") {
        return Ok(None);
    }
    let alternatives: Vec<String> = globs
        .iter()
        .map(|glob| {
            glob.split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        })
        .collect();
    let pattern = format!("^(?:{})$", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|source| StoreError::Pattern { pattern, source })
}

impl DatasetStore for ManifestStore {
    fn name(&self) -> &str {
        &self.label
    }

    fn resolve(&self, ids: &[Uuid]) -> Result<Vec<DatasetHandle>, StoreError> {
        let manifest = self.lock();
        let by_id: FxHashMap<Uuid, &ManifestDataset> =
            manifest.datasets.iter().map(|d| (d.id, d)).collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(|d| Self::to_handle(&manifest, d))
            .collect())
    }

    fn visit_timespans(&self, visits: &BTreeSet<VisitKey>) -> Result<Vec<VisitTiming>, StoreError> {
        let manifest = self.lock();
        Ok(manifest
            .visits
            .iter()
            .map(|v| VisitTiming {
                key: VisitKey::new(v.instrument.clone(), v.visit),
                timespan: v.timespan,
            })
            .filter(|timing| visits.contains(&timing.key))
            .collect())
    }

    fn query_datasets(
        &self,
        collections: &[String],
        type_patterns: &[String],
    ) -> Result<Vec<DatasetHandle>, StoreError> {
        let matcher = compile_type_patterns(type_patterns)?;
        let manifest = self.lock();
        Ok(manifest
            .datasets
            .iter()
            .filter(|d| collections.iter().any(|c| c == &d.collection))
            .filter(|d| matcher.as_ref().is_none_or(|re| re.is_match(&d.dataset_type)))
            .map(|d| Self::to_handle(&manifest, d))
            .collect())
    }

    fn export(&self, handles: &[DatasetHandle]) -> Result<Vec<DatasetHandle>, StoreError> {
        let manifest = self.lock();
        let stored: FxHashSet<Uuid> = manifest
            .datasets
            .iter()
            .filter(|d| d.stored)
            .map(|d| d.id)
            .collect();
        Ok(handles
            .iter()
            .filter(|h| stored.contains(&h.id))
            .cloned()
            .collect())
    }

    fn transfer_from(
        &self,
        source: &dyn DatasetStore,
        handles: &[DatasetHandle],
        register_dataset_types: bool,
    ) -> Result<Vec<DatasetHandle>, StoreError> {
        // Query the source before locking ourselves.
        let exported = source.export(handles)?;
        let visit_keys: BTreeSet<VisitKey> =
            exported.iter().filter_map(DatasetHandle::visit_key).collect();
        let timings = if visit_keys.is_empty() {
            Vec::new()
        } else {
            source.visit_timespans(&visit_keys)?
        };

        let mut manifest = self.lock();
        for handle in &exported {
            match manifest.dataset_types.get(&handle.dataset_type) {
                Some(existing) if existing != &handle.dimensions => {
                    return Err(StoreError::DatasetTypeConflict {
                        name: handle.dataset_type.clone(),
                        existing: existing.clone(),
                        requested: handle.dimensions.clone(),
                    });
                }
                Some(_) => {}
                None if register_dataset_types => {
                    manifest
                        .dataset_types
                        .insert(handle.dataset_type.clone(), handle.dimensions.clone());
                }
                None => {
                    return Err(StoreError::UnregisteredDatasetType(
                        handle.dataset_type.clone(),
                    ));
                }
            }
        }

        let known_visits: FxHashSet<VisitKey> = manifest
            .visits
            .iter()
            .map(|v| VisitKey::new(v.instrument.clone(), v.visit))
            .collect();
        for timing in timings {
            if !known_visits.contains(&timing.key) {
                manifest.visits.push(ManifestVisit {
                    instrument: timing.key.instrument,
                    visit: timing.key.visit,
                    timespan: timing.timespan,
                });
            }
        }

        let present: FxHashSet<Uuid> = manifest.datasets.iter().map(|d| d.id).collect();
        for handle in &exported {
            if present.contains(&handle.id) {
                continue;
            }
            manifest.datasets.push(ManifestDataset {
                id: handle.id,
                dataset_type: handle.dataset_type.clone(),
                collection: handle.collection.clone(),
                data_id: handle.data_id.clone(),
                stored: true,
            });
        }
        self.save(&manifest)?;
        debug!(
            source = source.name(),
            target = self.name(),
            requested = handles.len(),
            copied = exported.len(),
            "manifest transfer complete"
        );
        Ok(exported)
    }
}
