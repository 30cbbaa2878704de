//! CLI struct definitions for the embargo-ledger command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use crate::core::model::{DatasetOrigin, RepositoryRole};

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "embargo-ledger",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track where prompt processing datasets live and release them from embargo once policy allows."
)]
pub(crate) struct Cli {
    /// Configuration file (TOML). A missing file means defaults.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Ledger URI or path. Overrides `[ledger] uri` from the configuration.
    #[clap(long, global = true)]
    pub ledger: Option<String>,
    /// Release policy table (TOML). Defaults to the built-in prompt processing outputs.
    #[clap(long, global = true)]
    pub policy: Option<PathBuf>,
    /// Log filter, e.g. `info` or `embargo_ledger=debug`. Falls back to RUST_LOG.
    #[clap(long, global = true)]
    pub log_level: Option<String>,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the ledger tables, or upgrade an existing ledger
    InitDb,

    /// Register the datasets listed in a batch file
    RegisterBatch(RegisterBatchCli),

    /// Register every dataset already in some source collections
    RegisterCollections(RegisterCollectionsCli),

    /// List datasets whose embargo has expired
    Candidates(CandidatesCli),

    /// Copy expired datasets out of embargo and record the outcome
    Unembargo(TransferCli),

    /// Copy public datasets from prompt_prep to a downstream repository
    Publish(PublishCli),

    /// Summarize dataset counts per repository and status
    Status,

    /// Show the release policy in effect
    Policy,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RegisterBatchCli {
    /// Source repository manifest the batch ids are resolved against.
    pub source: PathBuf,
    /// JSON batch file: `{"batch_id": "...", "datasets": ["<uuid>", ...]}`.
    pub batch_file: PathBuf,
    #[clap(long, value_enum, default_value_t = DatasetOrigin::PromptProcessing)]
    pub origin: DatasetOrigin,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RegisterCollectionsCli {
    /// Source repository manifest.
    pub source: PathBuf,
    /// Collections to register.
    #[clap(required = true)]
    pub collections: Vec<String>,
    /// Dataset types to include, separated by commas or whitespace. Globs allowed.
    #[clap(long, default_value = "*")]
    pub types: String,
    #[clap(long, value_enum, default_value_t = DatasetOrigin::PromptProcessing)]
    pub origin: DatasetOrigin,
    /// Register without asking for confirmation.
    #[clap(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct CandidatesCli {
    /// Evaluate eligibility at this RFC 3339 time instead of now.
    #[clap(long)]
    pub now: Option<String>,
    /// Maximum number of candidates to list.
    #[clap(long)]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct TransferCli {
    /// Source repository manifest.
    pub source: PathBuf,
    /// Target repository manifest. Created if it does not exist.
    pub target: PathBuf,
    /// Datasets per batch. Overrides `[transfer] batch_size`.
    #[clap(long)]
    pub batch_size: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct PublishCli {
    #[clap(flatten)]
    pub transfer: TransferCli,
    /// Downstream repository to publish to.
    #[clap(long, value_enum)]
    pub to: RepositoryRole,
}
