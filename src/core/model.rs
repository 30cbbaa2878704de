//! Ledger data model: origins, per-repository location status, and rows.
//!
//! The integer values of [`DatasetOrigin`] and [`DatasetLocationStatus`] are
//! persisted. Never re-use a value when adding variants.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use uuid::Uuid;

/// Service/process that a dataset originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOrigin {
    /// Datasets created by prompt processing worker pods.
    PromptProcessing = 1,
}

impl DatasetOrigin {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::PromptProcessing),
            _ => None,
        }
    }
}

/// Status of a dataset in one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetLocationStatus {
    /// The dataset has never been stored in this location.
    #[default]
    NeverPresent = 0,
    /// The dataset is currently stored in this location.
    Present = 1,
    /// The dataset was expected here but could not be found.
    Missing = 2,
    /// The dataset was formerly present and was intentionally deleted.
    Deleted = 3,
}

impl DatasetLocationStatus {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::NeverPresent),
            1 => Some(Self::Present),
            2 => Some(Self::Missing),
            3 => Some(Self::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverPresent => "NEVER_PRESENT",
            Self::Present => "PRESENT",
            Self::Missing => "MISSING",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for DatasetLocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! int_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(*self as i64))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = i64::column_result(value)?;
                <$ty>::from_i64(raw).ok_or(FromSqlError::OutOfRange(raw))
            }
        }
    };
}

int_enum_sql!(DatasetOrigin);
int_enum_sql!(DatasetLocationStatus);

/// A repository a dataset can live in, ordered along the release pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryRole {
    /// The restricted embargo repository datasets are first written to.
    Embargo,
    /// `prompt_prep`, the central repository every transfer goes through.
    PromptPrep,
    /// `/repo/main` at USDF.
    RepoMain,
    /// The Google RSP integration-testing repository.
    GoogleInt,
    /// The Google RSP production repository.
    GoogleProd,
}

impl RepositoryRole {
    pub const ALL: [RepositoryRole; 5] = [
        Self::Embargo,
        Self::PromptPrep,
        Self::RepoMain,
        Self::GoogleInt,
        Self::GoogleProd,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Embargo => "embargo",
            Self::PromptPrep => "prompt-prep",
            Self::RepoMain => "repo-main",
            Self::GoogleInt => "google-int",
            Self::GoogleProd => "google-prod",
        }
    }

    pub fn status_column(self) -> &'static str {
        match self {
            Self::Embargo => "embargo_status",
            Self::PromptPrep => "prompt_prep_status",
            Self::RepoMain => "repo_main_status",
            Self::GoogleInt => "google_int_status",
            Self::GoogleProd => "google_prod_status",
        }
    }

    /// Column stamped when a dataset arrives in this repository. The embargo
    /// repository is where datasets start, so it has none.
    pub fn release_time_column(self) -> Option<&'static str> {
        match self {
            Self::Embargo => None,
            Self::PromptPrep => Some("unembargo_time"),
            Self::RepoMain => Some("repo_main_time"),
            Self::GoogleInt => Some("google_int_time"),
            Self::GoogleProd => Some("google_prod_time"),
        }
    }
}

impl fmt::Display for RepositoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown repository role '{}'", s))
    }
}

/// One source -> target step along the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub source: RepositoryRole,
    pub target: RepositoryRole,
}

impl Hop {
    /// Copying data out of embargo into prompt_prep.
    pub const UNEMBARGO: Hop = Hop {
        source: RepositoryRole::Embargo,
        target: RepositoryRole::PromptPrep,
    };

    /// Hops that leave prompt_prep for a downstream repository.
    pub fn publish_to(target: RepositoryRole) -> Option<Hop> {
        match target {
            RepositoryRole::Embargo | RepositoryRole::PromptPrep => None,
            _ => Some(Hop {
                source: RepositoryRole::PromptPrep,
                target,
            }),
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Location status vector, indexed by [`RepositoryRole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LocationStatuses([DatasetLocationStatus; RepositoryRole::ALL.len()]);

impl LocationStatuses {
    pub fn get(&self, role: RepositoryRole) -> DatasetLocationStatus {
        self.0[role.index()]
    }

    pub fn set(&mut self, role: RepositoryRole, status: DatasetLocationStatus) {
        self.0[role.index()] = status;
    }
}

impl Index<RepositoryRole> for LocationStatuses {
    type Output = DatasetLocationStatus;

    fn index(&self, role: RepositoryRole) -> &Self::Output {
        &self.0[role.index()]
    }
}

/// Primary key of a visit row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisitKey {
    pub instrument: String,
    pub visit: i64,
}

impl VisitKey {
    pub fn new(instrument: impl Into<String>, visit: i64) -> Self {
        Self {
            instrument: instrument.into(),
            visit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitRecord {
    pub instrument: String,
    pub visit: i64,
    /// When the visit ended; `None` if the observation timespan is open or unknown.
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub origin: DatasetOrigin,
    pub dataset_type: String,
    pub instrument: Option<String>,
    pub visit: Option<i64>,
    pub statuses: LocationStatuses,
    pub release_times: [Option<DateTime<Utc>>; RepositoryRole::ALL.len()],
}

impl DatasetRecord {
    pub fn status(&self, role: RepositoryRole) -> DatasetLocationStatus {
        self.statuses.get(role)
    }

    pub fn release_time(&self, role: RepositoryRole) -> Option<DateTime<Utc>> {
        self.release_times[role.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownDatasetRecord {
    pub id: Uuid,
    pub origin: DatasetOrigin,
    /// Human readable reason this id is tracked here instead of in `dataset`.
    pub error: String,
}
