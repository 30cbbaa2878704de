//! Pipeline stages that read and advance the ledger.

pub mod eligibility;
pub mod ingest;
pub mod policy;
pub mod prompt_outputs;
pub mod transfer;
