//! embargo-ledger: dataset location ledger and embargo-release scheduler.
//!
//! Prompt processing writes its outputs to a restricted embargo repository.
//! This crate records, per dataset, which repositories hold it, decides when
//! each dataset may leave embargo according to a per-dataset-type policy, and
//! reconciles the ledger with whatever a batched transfer actually achieved.
//!
//! # Pipeline
//!
//! ```text
//! embargo --unembargo--> prompt_prep --publish--> repo_main | google_int | google_prod
//! ```
//!
//! - Ingestion ([`plugins::ingest`]) registers datasets as PRESENT in embargo.
//!   Replays are harmless: every insert is insert-if-absent.
//! - Eligibility ([`plugins::eligibility`]) groups dataset types by policy and
//!   runs one bounded query per invocation.
//! - Transfer ([`plugins::transfer`]) moves candidates in batches and commits
//!   each batch's outcome as one unit of work.
//!
//! # Examples
//!
//! ```bash
//! embargo-ledger --ledger state.sqlite init-db
//! embargo-ledger --ledger state.sqlite register-batch embargo.json batch.json
//! embargo-ledger --ledger state.sqlite candidates --now 2025-12-06T12:00:00Z
//! embargo-ledger --ledger state.sqlite unembargo embargo.json prompt_prep.json
//! embargo-ledger --ledger state.sqlite publish prompt_prep.json main.json --to repo-main
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: ledger schema, unit of work, domain types, configuration
//! - [`plugins`]: policy, ingestion, eligibility, transfer
//! - [`store`]: the dataset repository interface and its manifest-backed implementation

pub mod core;
pub mod plugins;
pub mod store;

mod cli;

use crate::cli::{Cli, Command, OutputFormat};
use crate::core::ledger::{Ledger, LedgerCounts, StatusCount};
use crate::core::{config, error::LedgerError, model::Hop, time};
use crate::plugins::{eligibility, ingest, policy, prompt_outputs, transfer};
use crate::store::{DatasetHandle, DatasetStore, ManifestStore};

use clap::Parser;
use colored::Colorize;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn run() -> Result<(), LedgerError> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = config::load_config(cli.config.as_deref())?;
    let policy = match cli.policy.as_deref().or(config.policy.file.as_deref()) {
        Some(path) => policy::load_policy_file(path)?,
        None => prompt_outputs::prompt_processing_outputs(),
    };
    let format = cli.format;
    let mut settings = config.transfer_settings();
    let open_ledger = || Ledger::open(config.ledger_uri(cli.ledger.as_deref()));

    match cli.command {
        Command::Policy => show_policy(&policy, format),
        Command::InitDb => {
            let ledger = open_ledger()?;
            let counts = ledger.counts()?;
            emit(format, "init-db", &counts, || {
                println!(
                    "{} Ledger ready at {}",
                    "✓".bright_green(),
                    ledger.path().display().to_string().bright_cyan()
                );
            })
        }
        Command::RegisterBatch(args) => {
            let ledger = open_ledger()?;
            let source = ManifestStore::open_existing(&args.source)?;
            let report =
                ingest::register_dataset_batch_file(&ledger, args.origin, &source, &args.batch_file)?;
            emit(format, "register-batch", &report, || print_ingest_report(&report))
        }
        Command::RegisterCollections(args) => {
            let ledger = open_ledger()?;
            let source = ManifestStore::open_existing(&args.source)?;
            let types = split_type_patterns(&args.types)?;
            let datasets = source.query_datasets(&args.collections, &types)?;
            info!(
                collections = ?args.collections,
                types = ?types,
                found = datasets.len(),
                "queried source collections"
            );

            if datasets.is_empty() {
                return emit(format, "register-collections", &ingest::IngestReport::default(), || {
                    println!("{} No matching datasets found.", "▸".bright_cyan());
                });
            }
            if !args.yes {
                let found = count_by_type(&datasets);
                print_found_datasets(format, &found);
                if !confirm(format, &format!("Register {} dataset(s)?", datasets.len()))? {
                    return emit_with_status(
                        format,
                        "register-collections",
                        "aborted",
                        &serde_json::json!({ "found": found, "registered": 0 }),
                        || println!("{} Aborted, nothing registered.", "⚠".bright_yellow()),
                    );
                }
            }

            let report = ingest::register_embargo_datasets(&ledger, args.origin, &source, &datasets)?;
            emit(format, "register-collections", &report, || {
                print_ingest_report(&report)
            })
        }
        Command::Candidates(args) => {
            let ledger = open_ledger()?;
            let now = match args.now.as_deref() {
                Some(s) => time::parse_rfc3339(s)?,
                None => chrono::Utc::now(),
            };
            let limit = args.limit.unwrap_or(settings.max_candidates);
            let candidates = eligibility::find_release_candidates(&policy, &ledger, now, limit)?;

            #[derive(Serialize)]
            struct CandidateList {
                now: String,
                count: usize,
                datasets: Vec<uuid::Uuid>,
            }
            let list = CandidateList {
                now: now.to_rfc3339(),
                count: candidates.len(),
                datasets: candidates,
            };
            emit(format, "candidates", &list, || {
                for id in &list.datasets {
                    println!("{}", id);
                }
                println!(
                    "{} {} dataset(s) eligible for release at {}",
                    "▸".bright_cyan(),
                    list.count.to_string().bright_green(),
                    list.now
                );
            })
        }
        Command::Unembargo(args) => {
            if let Some(batch_size) = args.batch_size {
                settings.batch_size = batch_size.max(1);
            }
            let ledger = open_ledger()?;
            let source = ManifestStore::open_existing(&args.source)?;
            let target = ManifestStore::open(&args.target)?;
            let report =
                transfer::unembargo_datasets(&policy, &source, &target, &ledger, &settings)?;
            emit(format, "unembargo", &report, || {
                print_transfer_report(Hop::UNEMBARGO, &report)
            })
        }
        Command::Publish(args) => {
            let hop = Hop::publish_to(args.to).ok_or_else(|| {
                LedgerError::ValidationError(format!(
                    "cannot publish to '{}': choose a repository downstream of prompt-prep",
                    args.to
                ))
            })?;
            if let Some(batch_size) = args.transfer.batch_size {
                settings.batch_size = batch_size.max(1);
            }
            let ledger = open_ledger()?;
            let source = ManifestStore::open_existing(&args.transfer.source)?;
            let target = ManifestStore::open(&args.transfer.target)?;
            let report =
                transfer::publish_datasets(&policy, hop, &source, &target, &ledger, &settings)?;
            emit(format, "publish", &report, || print_transfer_report(hop, &report))
        }
        Command::Status => {
            let ledger = open_ledger()?;
            #[derive(Serialize)]
            struct Status {
                counts: LedgerCounts,
                statuses: Vec<StatusCount>,
            }
            let status = Status {
                counts: ledger.counts()?,
                statuses: ledger.status_summary()?,
            };
            emit(format, "status", &status, || {
                println!(
                    "{} datasets: {}  visits: {}  unknown: {}",
                    "▸".bright_cyan(),
                    status.counts.datasets.to_string().bright_green(),
                    status.counts.visits,
                    status.counts.unknown_datasets.to_string().bright_yellow()
                );
                for row in &status.statuses {
                    println!(
                        "  {:<12} {:<13} {}",
                        row.role.as_str(),
                        row.status.as_str(),
                        row.count
                    );
                }
            })
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    // Already installed when embedded in a host process or a test harness.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .try_init();
}

/// Print `report` as a JSON command envelope, or run `text` for operators.
fn emit<T: Serialize>(
    format: OutputFormat,
    cmd: &str,
    report: &T,
    text: impl FnOnce(),
) -> Result<(), LedgerError> {
    emit_with_status(format, cmd, "ok", report, text)
}

fn emit_with_status<T: Serialize>(
    format: OutputFormat,
    cmd: &str,
    status: &str,
    report: &T,
    text: impl FnOnce(),
) -> Result<(), LedgerError> {
    match format {
        OutputFormat::Json => {
            let envelope = time::command_envelope(cmd, status, serde_json::to_value(report)?);
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        OutputFormat::Text => text(),
    }
    Ok(())
}

fn split_type_patterns(types: &str) -> Result<Vec<String>, LedgerError> {
    let separator = Regex::new(r"[\s,]+")
        .map_err(|e| LedgerError::ValidationError(format!("type separator: {}", e)))?;
    Ok(separator
        .split(types.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Dataset count per type, in type order.
fn count_by_type(datasets: &[DatasetHandle]) -> BTreeMap<&str, usize> {
    let mut found = BTreeMap::new();
    for handle in datasets {
        *found.entry(handle.dataset_type.as_str()).or_insert(0) += 1;
    }
    found
}

/// Interactive output goes to stderr in JSON mode so stdout stays one document.
fn prompt_writer(format: OutputFormat) -> Box<dyn Write> {
    match format {
        OutputFormat::Json => Box::new(io::stderr()),
        OutputFormat::Text => Box::new(io::stdout()),
    }
}

fn print_found_datasets(format: OutputFormat, found: &BTreeMap<&str, usize>) {
    let mut out = prompt_writer(format);
    let _ = writeln!(out, "{} Found datasets:", "▸".bright_cyan());
    for (dataset_type, count) in found {
        let _ = writeln!(out, "    {}: {}", dataset_type, count);
    }
}

fn confirm(format: OutputFormat, prompt: &str) -> Result<bool, LedgerError> {
    let mut out = prompt_writer(format);
    write!(out, "{} {} [y/N] ", "?".bright_yellow(), prompt)?;
    out.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn show_policy(policy: &policy::PolicyTable, format: OutputFormat) -> Result<(), LedgerError> {
    #[derive(Serialize)]
    struct PolicyRow<'a> {
        dataset_type: &'a str,
        #[serde(flatten)]
        policy: &'a policy::DatasetTypePolicy,
    }
    let rows: Vec<PolicyRow<'_>> = policy
        .iter()
        .map(|(dataset_type, policy)| PolicyRow {
            dataset_type,
            policy,
        })
        .collect();

    emit(format, "policy", &serde_json::json!({ "policies": rows }), || {
        for group in policy.group_by(|p| (p.embargo_hours, p.public, p.retention)) {
            let (hours, public, retention) = group.key;
            println!(
                "{} embargo {}h, {}, retained {}",
                "▸".bright_cyan(),
                hours,
                if public {
                    "public".bright_green()
                } else {
                    "internal".bright_yellow()
                },
                retention
            );
            for dataset_type in &group.dataset_types {
                println!("    {}", dataset_type);
            }
        }
    })
}

fn print_ingest_report(report: &ingest::IngestReport) {
    println!(
        "{} {} dataset(s) seen, {} new, {} new visit(s)",
        "✓".bright_green(),
        report.datasets_seen,
        report.datasets_inserted.to_string().bright_green(),
        report.visits_inserted
    );
    if !report.unknown.is_empty() {
        println!(
            "{} {} dataset(s) not found in the source repository",
            "⚠".bright_yellow(),
            report.unknown.len().to_string().bright_yellow()
        );
    }
}

fn print_transfer_report(hop: Hop, report: &transfer::TransferReport) {
    println!(
        "{} {}: {} candidate(s) in {} batch(es), {} transferred",
        "✓".bright_green(),
        hop,
        report.candidates,
        report.batches,
        report.transferred.to_string().bright_green()
    );
    let missing = report.missing_registry + report.missing_datastore;
    if missing > 0 {
        println!(
            "{} {} missing ({} from registry, {} from datastore)",
            "⚠".bright_yellow(),
            missing.to_string().bright_yellow(),
            report.missing_registry,
            report.missing_datastore
        );
    }
}
