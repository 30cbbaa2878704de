//! Shared timestamp/event helpers for ledger columns and command envelopes.

use crate::core::error::LedgerError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Column format for every timestamp in the ledger. Fixed width, so SQLite
/// text comparison orders the same way as time.
const DB_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn to_db_time(t: &DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

pub fn from_db_time(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    NaiveDateTime::parse_from_str(s, DB_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| LedgerError::InvalidValue(format!("timestamp '{}': {}", s, e)))
}

/// Parses an operator-supplied RFC 3339 timestamp (`--now`).
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| LedgerError::ValidationError(format!("invalid timestamp '{}': {}", s, e)))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
