//! CLI argument parsing for axiom.
//!
//! Uses clap derive macros for declarative argument definitions. This module
//! defines the command structure; implementations live in the `commands`
//! module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Axiom: Markdown-driven dispatcher for AI coding-agent CLIs.
///
/// Task state lives in a PRD Markdown table; each PENDING task is executed by
/// a provider CLI subprocess, with agent questions answered by a rule engine
/// and unanswered runs restarted with injected context. Reusable lessons are
/// harvested into a flat-file knowledge store under `.axiom/`.
#[derive(Parser, Debug)]
#[command(name = "axiom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for axiom.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the axiom workspace in the current repository.
    ///
    /// Creates the `.axiom/` layout, the default providers.yaml, and the
    /// session heartbeat file. Idempotent.
    Init,

    /// Dispatch all PENDING tasks from a PRD.
    ///
    /// Parses the task table, executes each ready task through the active
    /// provider, writes statuses back, and prints the final report. Exits 0
    /// only when no task failed or blocked.
    Run(RunArgs),

    /// Show the status dashboard.
    ///
    /// PRD task counts, knowledge statistics, and heartbeat age.
    Status(StatusArgs),

    /// Knowledge store commands.
    ///
    /// Add entries, adjust confidence, rebuild the index.
    Knowledge(KnowledgeCommand),

    /// Create a checkpoint Git tag.
    Checkpoint(CheckpointArgs),

    /// List configured providers.
    Providers(ProvidersCommand),

    /// Session watchdog.
    ///
    /// Polls the heartbeat file mtime and warns when the session goes stale.
    Guard(GuardArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the PRD Markdown file holding the task table.
    #[arg(long)]
    pub prd: PathBuf,

    /// Repository to operate on (defaults to the current repository).
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Provider to dispatch to (defaults to the configured default).
    #[arg(long)]
    pub provider: Option<String>,

    /// Parse and report without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print per-task output after each execution.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// PRD to include task progress from.
    #[arg(long)]
    pub prd: Option<PathBuf>,

    /// Also write the dashboard to this file.
    #[arg(long)]
    pub write: Option<PathBuf>,
}

/// Knowledge subcommands.
#[derive(Parser, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

/// Available knowledge actions.
#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Add a new knowledge entry and rebuild the index.
    Add(KnowledgeAddArgs),

    /// Print the knowledge index.
    List,

    /// Record a successful verification (+0.1 confidence).
    Verify(KnowledgeIdArgs),

    /// Record a reference during work (+0.05 confidence).
    Reference(KnowledgeIdArgs),

    /// Record a misleading outcome (-0.2 confidence).
    Misleading(KnowledgeIdArgs),

    /// Decay entries unused past the threshold (-0.1 confidence).
    Decay(KnowledgeDecayArgs),

    /// List entries below the deprecation threshold.
    Deprecated,
}

/// Arguments for `knowledge add`.
#[derive(Parser, Debug)]
pub struct KnowledgeAddArgs {
    /// Entry title.
    pub title: String,

    /// Category (architecture, debugging, pattern, workflow, tooling).
    #[arg(long)]
    pub category: String,

    /// Tags for the index tag cloud.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// One-paragraph summary.
    #[arg(long, default_value = "")]
    pub summary: String,

    /// Longer details section.
    #[arg(long, default_value = "")]
    pub details: String,
}

/// Arguments for knowledge actions addressing one entry.
#[derive(Parser, Debug)]
pub struct KnowledgeIdArgs {
    /// Entry id (e.g. k-001).
    pub id: String,
}

/// Arguments for `knowledge decay`.
#[derive(Parser, Debug)]
pub struct KnowledgeDecayArgs {
    /// Unused threshold in days.
    #[arg(long, default_value_t = 30)]
    pub days: i64,
}

/// Arguments for the `checkpoint` command.
#[derive(Parser, Debug)]
pub struct CheckpointArgs {
    /// Tag name (auto-generated from the timestamp when omitted).
    #[arg(long)]
    pub tag: Option<String>,
}

/// Provider subcommands.
#[derive(Parser, Debug)]
pub struct ProvidersCommand {
    #[command(subcommand)]
    pub action: ProvidersAction,
}

/// Available provider actions.
#[derive(Subcommand, Debug)]
pub enum ProvidersAction {
    /// Show all configured provider profiles.
    List,
}

/// Arguments for the `guard` command.
#[derive(Parser, Debug)]
pub struct GuardArgs {
    /// Staleness threshold in minutes.
    #[arg(long, default_value_t = 30)]
    pub timeout_minutes: u64,

    /// Poll interval in minutes.
    #[arg(long, default_value_t = 5)]
    pub interval_minutes: u64,

    /// Perform a single check and exit (exit 2 when stale).
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
