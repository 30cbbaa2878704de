//! Dataset store interface.
//!
//! The ledger never moves files itself. It asks a [`DatasetStore`] to resolve
//! ids, look up visit timing, and copy datasets between repositories.
//! [`manifest::ManifestStore`] is the implementation shipped with the binary.

pub mod manifest;

use crate::core::model::VisitKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use thiserror::Error;
use uuid::Uuid;

pub use manifest::ManifestStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Malformed repository manifest {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Dataset type '{0}' is not registered in the target repository")]
    UnregisteredDatasetType(String),
    #[error("Dataset type '{name}' is registered with dimensions {existing:?}, not {requested:?}")]
    DatasetTypeConflict {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },
    #[error("Invalid dataset type pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One dimension value in a data ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataIdValue {
    Int(i64),
    Str(String),
}

/// A dataset resolved against a repository registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub id: Uuid,
    pub dataset_type: String,
    /// RUN collection the dataset was written into.
    #[serde(default)]
    pub collection: String,
    /// Dimensions declared by the dataset type.
    pub dimensions: Vec<String>,
    pub data_id: BTreeMap<String, DataIdValue>,
}

impl DatasetHandle {
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d == name)
    }

    pub fn instrument(&self) -> Option<&str> {
        match self.data_id.get("instrument")? {
            DataIdValue::Str(s) => Some(s.as_str()),
            DataIdValue::Int(_) => None,
        }
    }

    pub fn visit(&self) -> Option<i64> {
        match self.data_id.get("visit")? {
            DataIdValue::Int(v) => Some(*v),
            DataIdValue::Str(_) => None,
        }
    }

    /// The (instrument, visit) this dataset belongs to, when its type has a
    /// visit dimension.
    pub fn visit_key(&self) -> Option<VisitKey> {
        if !self.has_dimension("visit") {
            return None;
        }
        Some(VisitKey::new(self.instrument()?, self.visit()?))
    }
}

/// A half-open observation interval. Either bound may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timespan {
    #[serde(default)]
    pub begin: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl Timespan {
    pub fn is_empty(&self) -> bool {
        matches!((self.begin, self.end), (Some(begin), Some(end)) if end <= begin)
    }

    /// End of the observation, or `None` when unbounded or empty.
    pub fn definite_end(&self) -> Option<DateTime<Utc>> {
        if self.is_empty() { None } else { self.end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitTiming {
    pub key: VisitKey,
    pub timespan: Option<Timespan>,
}

pub trait DatasetStore {
    /// Label used in log messages.
    fn name(&self) -> &str;

    /// Look up ids in the registry. Ids that are not known are left out.
    fn resolve(&self, ids: &[Uuid]) -> Result<Vec<DatasetHandle>, StoreError>;

    /// Timing records for the requested visits. Visits without a record are left out.
    fn visit_timespans(&self, visits: &BTreeSet<VisitKey>) -> Result<Vec<VisitTiming>, StoreError>;

    /// Every dataset in `collections` whose type matches one of `type_patterns`
    /// (`*` wildcards allowed).
    fn query_datasets(
        &self,
        collections: &[String],
        type_patterns: &[String],
    ) -> Result<Vec<DatasetHandle>, StoreError>;

    /// The subset of `handles` whose artifacts are actually stored.
    fn export(&self, handles: &[DatasetHandle]) -> Result<Vec<DatasetHandle>, StoreError>;

    /// Copy `handles` from `source` into this repository. Returns the handles
    /// that now exist here.
    fn transfer_from(
        &self,
        source: &dyn DatasetStore,
        handles: &[DatasetHandle],
        register_dataset_types: bool,
    ) -> Result<Vec<DatasetHandle>, StoreError>;
}
