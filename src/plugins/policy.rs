//! Release policy per dataset type.
//!
//! A [`PolicyTable`] is static configuration: which dataset types wait out an
//! embargo, which are published, and how long they are retained. The
//! scheduler only ever asks it to partition dataset types by some projection
//! of their policy, so that one query can cover every type in a group.

use crate::core::error::LedgerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::num::NonZeroU32;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("No release policy configured for dataset type '{0}'")]
    UnknownDatasetType(String),
    #[error("Dataset type '{dataset_type}' refers to undefined tier '{tier}'")]
    UnknownTier { dataset_type: String, tier: String },
    #[error("Invalid retention period: {0}")]
    InvalidRetention(String),
}

/// How long a dataset is kept after it is unembargoed or published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RetentionPeriod {
    Days(NonZeroU32),
    Forever,
}

impl fmt::Display for RetentionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(days) => write!(f, "{} days", days),
            Self::Forever => f.write_str("forever"),
        }
    }
}

impl Serialize for RetentionPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Days(days) => serializer.serialize_u32(days.get()),
            Self::Forever => serializer.serialize_str("forever"),
        }
    }
}

impl<'de> Deserialize<'de> for RetentionPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Days(u32),
            Keyword(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Days(days) => NonZeroU32::new(days).map(Self::Days).ok_or_else(|| {
                serde::de::Error::custom(PolicyError::InvalidRetention(
                    "retention must be at least one day".to_string(),
                ))
            }),
            Raw::Keyword(word) if word == "forever" => Ok(Self::Forever),
            Raw::Keyword(word) => Err(serde::de::Error::custom(PolicyError::InvalidRetention(
                format!("expected a day count or \"forever\", got \"{}\"", word),
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetTypePolicy {
    /// Hours to wait after the visit ended before the dataset may leave embargo.
    pub embargo_hours: u32,
    /// Published to the user-facing repositories, or kept internal.
    pub public: bool,
    #[serde(rename = "retention_days")]
    pub retention: RetentionPeriod,
}

impl DatasetTypePolicy {
    pub const fn new(embargo_hours: u32, public: bool, retention: RetentionPeriod) -> Self {
        Self {
            embargo_hours,
            public,
            retention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyGroup<K> {
    pub key: K,
    /// Sorted dataset type names sharing `key`.
    pub dataset_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    policies: BTreeMap<String, DatasetTypePolicy>,
}

/// On-disk form: tiers are declared once and dataset types name their tier.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    tiers: BTreeMap<String, DatasetTypePolicy>,
    #[serde(default)]
    dataset_types: BTreeMap<String, String>,
}

impl PolicyTable {
    pub fn new<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = (S, DatasetTypePolicy)>,
        S: Into<String>,
    {
        Self {
            policies: policies
                .into_iter()
                .map(|(name, policy)| (name.into(), policy))
                .collect(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LedgerError> {
        let file: PolicyFile = toml::from_str(content)?;
        let mut policies = BTreeMap::new();
        for (dataset_type, tier) in file.dataset_types {
            let policy = file.tiers.get(&tier).copied().ok_or_else(|| {
                PolicyError::UnknownTier {
                    dataset_type: dataset_type.clone(),
                    tier: tier.clone(),
                }
            })?;
            policies.insert(dataset_type, policy);
        }
        Ok(Self { policies })
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn get(&self, dataset_type: &str) -> Option<&DatasetTypePolicy> {
        self.policies.get(dataset_type)
    }

    pub fn require(&self, dataset_type: &str) -> Result<&DatasetTypePolicy, PolicyError> {
        self.get(dataset_type)
            .ok_or_else(|| PolicyError::UnknownDatasetType(dataset_type.to_string()))
    }

    /// Fail on the first dataset type without a policy.
    pub fn check_known<'a, I>(&self, dataset_types: I) -> Result<(), PolicyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for dataset_type in dataset_types {
            self.require(dataset_type)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatasetTypePolicy)> {
        self.policies.iter().map(|(name, policy)| (name.as_str(), policy))
    }

    /// Partition dataset types by `key_func`, groups ordered by key.
    pub fn group_by<K, F>(&self, key_func: F) -> Vec<PolicyGroup<K>>
    where
        K: Ord,
        F: Fn(&DatasetTypePolicy) -> K,
    {
        let mut groups: BTreeMap<K, BTreeSet<&str>> = BTreeMap::new();
        for (dataset_type, policy) in &self.policies {
            groups
                .entry(key_func(policy))
                .or_default()
                .insert(dataset_type.as_str());
        }
        groups
            .into_iter()
            .map(|(key, names)| PolicyGroup {
                key,
                dataset_types: names.into_iter().map(str::to_string).collect(),
            })
            .collect()
    }
}

pub fn load_policy_file(path: &Path) -> Result<PolicyTable, LedgerError> {
    let content = fs::read_to_string(path)?;
    PolicyTable::from_toml_str(&content)
}
