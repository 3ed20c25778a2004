//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    check::CheckArgs, completions::CompletionsArgs, init::InitArgs, normalize::NormalizeArgs,
    phase::PhaseCommands, remote::RemoteCommands, repair::RepairArgs, spec::SpecCommands,
    store::StoreCommands, validate::ValidateArgs, workflow::WorkflowCommands,
};

#[derive(Parser)]
#[command(name = "spectrack")]
#[command(author, version, about = "Spec lifecycle tracker")]
#[command(long_about = "Tracks specs through requirements, design, tasks, implementation, review and completion, keeping markdown documents, a local store and GitHub issues consistent.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .spectrack/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new spectrack project
    Init(InitArgs),

    /// Create, list and show specs
    #[command(subcommand)]
    Spec(SpecCommands),

    /// Compare documents against the store (read-only)
    Check(CheckArgs),

    /// Reconcile the store from the documents
    Repair(RepairArgs),

    /// Fix header formatting drift in spec documents
    Normalize(NormalizeArgs),

    /// Strictly validate spec document headers
    Validate(ValidateArgs),

    /// Move specs through the lifecycle
    #[command(subcommand)]
    Phase(PhaseCommands),

    /// Link and sync specs with GitHub issues
    #[command(subcommand)]
    Remote(RemoteCommands),

    /// Resumable task cursor per spec
    #[command(subcommand)]
    Workflow(WorkflowCommands),

    /// Local store maintenance
    #[command(subcommand)]
    Store(StoreCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable (tables for lists)
    #[default]
    Auto,
    /// YAML format
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Tab-separated values (for piping)
    Tsv,
    /// Just IDs, one per line
    Id,
}
