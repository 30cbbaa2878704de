use crate::plugins::policy::PolicyError;
use crate::store::StoreError;
use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Dataset store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Policy error: {0}")]
    PolicyError(#[from] PolicyError),
    /// The request is well-formed but asks for something the ledger does not track yet.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Invalid value in ledger: {0}")]
    InvalidValue(String),
    #[error("Unhandled database engine '{0}'")]
    UnsupportedDatabase(String),
    #[error("Ledger schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
    #[error("Validation error: {0}")]
    ValidationError(String),
}
