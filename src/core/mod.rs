//! Core modules for the location ledger.
//!
//! The ledger schema, its unit of work and the shared domain types live here.
//! Policy, ingestion and release logic build on top of these in `plugins`.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod model;
pub mod pool;
pub mod schemas;
pub mod time;
