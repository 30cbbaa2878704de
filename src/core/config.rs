//! Optional TOML configuration for the CLI.
//!
//! ```toml
//! [ledger]
//! uri = "sqlite:///data/publication_state.sqlite"
//!
//! [transfer]
//! batch_size = 1000
//! max_candidates = 1000000
//!
//! [policy]
//! file = "policy.toml"
//! ```

use crate::core::error::LedgerError;
use crate::core::schemas;
use crate::plugins::eligibility::MAX_CANDIDATES;
use crate::plugins::transfer::{TRANSFER_BATCH_SIZE, TransferSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub transfer: TransferSection,
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSection {
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransferSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_candidates: default_max_candidates(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Policy table to use instead of the built-in prompt processing outputs.
    pub file: Option<PathBuf>,
}

fn default_batch_size() -> usize {
    TRANSFER_BATCH_SIZE
}

fn default_max_candidates() -> usize {
    MAX_CANDIDATES
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, LedgerError> {
        let config: AppConfig = toml::from_str(content)?;
        if config.transfer.batch_size == 0 {
            return Err(LedgerError::ValidationError(
                "transfer.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            batch_size: self.transfer.batch_size,
            max_candidates: self.transfer.max_candidates,
        }
    }

    /// The ledger to use: an explicit argument wins over the configured URI,
    /// which wins over `publication_state.sqlite` in the working directory.
    pub fn ledger_uri<'a>(&'a self, cli_value: Option<&'a str>) -> &'a str {
        cli_value
            .or(self.ledger.uri.as_deref())
            .unwrap_or(schemas::DEFAULT_LEDGER_NAME)
    }
}

/// Load configuration from `path`. No path, or a path that does not exist,
/// gives the defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, LedgerError> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    AppConfig::from_toml_str(&content)
}
