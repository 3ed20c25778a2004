//! `spectrack store` command - Local store maintenance

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{open_context, print_structured, success};
use crate::cli::GlobalOpts;

#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Show store statistics
    Status,

    /// Write a consistent snapshot of the store
    Backup {
        /// Destination file (default: .spectrack/backups/store-<timestamp>.db)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

pub fn run(cmd: StoreCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;

    match cmd {
        StoreCommands::Status => {
            let stats = ctx.store.statistics()?;
            if print_structured(&stats, global.format)? {
                return Ok(());
            }

            println!("{}", style("Store Status").bold());
            println!("{}", style("─".repeat(40)).dim());
            if let Some(path) = ctx.store.path() {
                println!("  Location:        {}", style(path.display()).dim());
            }
            println!("  Size:            {} KB", stats.db_size_bytes / 1024);
            println!("  Specs:           {}", style(stats.total_specs).cyan());
            for group in &stats.by_phase {
                println!("    {:<15} {}", group.group, group.count);
            }
            println!("  Linked:          {}", style(stats.linked_specs).cyan());
            if stats.failed_syncs > 0 {
                println!("  Failed syncs:    {}", style(stats.failed_syncs).red());
            }
            println!("  Workflow states: {}", stats.workflow_states);
        }

        StoreCommands::Backup { output } => {
            let dest = output.unwrap_or_else(|| {
                ctx.project
                    .backup_dir()
                    .join(format!("store-{}.db", Utc::now().format("%Y%m%dT%H%M%S")))
            });
            ctx.store.backup(&dest)?;
            success(global, format!("Store backed up to {}", style(dest.display()).dim()));
        }
    }
    Ok(())
}
