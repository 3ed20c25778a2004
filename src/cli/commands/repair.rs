//! `spectrack repair` command - Reconcile the store from the documents

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{open_context, print_structured, success};
use crate::cli::GlobalOpts;
use crate::core::integrity;
use crate::core::repair::{self, RepairOutcome};

#[derive(clap::Args, Debug)]
pub struct RepairArgs {
    /// Also delete store records whose document is gone
    #[arg(long)]
    pub prune_orphans: bool,

    /// Do not ask before pruning
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Skip the store backup taken before repairing
    #[arg(long)]
    pub no_backup: bool,
}

pub fn run(args: RepairArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let report = integrity::check(&ctx.store, ctx.documents_dir())?;

    if report.is_consistent() {
        if !print_structured(&RepairOutcome::default(), global.format)? {
            success(global, "Nothing to repair; documents and store are consistent");
        }
        return Ok(());
    }

    if ctx.config.store.backup_before_repair && !args.no_backup {
        if let Some(path) = repair::backup_before_repair(&ctx.store, &ctx.project.backup_dir()) {
            if !global.quiet {
                println!("{} Backup written to {}", style("→").blue(), style(path.display()).dim());
            }
        }
    }

    let outcome = repair::repair(&ctx.store, ctx.documents_dir(), &report)?;

    let mut pruned = Vec::new();
    if args.prune_orphans && !outcome.flagged_store_only.is_empty() {
        let confirmed = args.yes
            || Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "Delete {} store record(s) with no document?",
                    outcome.flagged_store_only.len()
                ))
                .default(false)
                .interact()
                .into_diagnostic()?;
        if confirmed {
            pruned = repair::prune_orphans(&ctx.store, &outcome.flagged_store_only)?;
        }
    }

    if print_structured(&outcome, global.format)? {
        return Ok(());
    }

    for id in &outcome.imported {
        println!("{} imported {}", style("+").green(), style(id).cyan());
    }
    for id in &outcome.updated {
        println!("{} updated  {}", style("~").yellow(), style(id).cyan());
    }
    for failure in &outcome.failed {
        println!(
            "{} failed   {}: {}",
            style("✗").red(),
            style(&failure.id).cyan(),
            failure.error
        );
    }
    for id in &pruned {
        println!("{} pruned   {}", style("-").red(), style(id).cyan());
    }
    let kept_orphans = outcome.flagged_store_only.len() - pruned.len();
    if kept_orphans > 0 {
        println!(
            "{} {} store record(s) without a document left in place (use {})",
            style("!").yellow(),
            kept_orphans,
            style("--prune-orphans").yellow()
        );
    }

    success(
        global,
        format!(
            "Repair complete: {} imported, {} updated, {} failed",
            outcome.imported.len(),
            outcome.updated.len(),
            outcome.failed.len()
        ),
    );

    if !outcome.failed.is_empty() {
        return Err(miette::miette!(
            help = "fix the documents (see `spectrack validate`) and repair again",
            "{} document(s) could not be repaired",
            outcome.failed.len()
        ));
    }
    Ok(())
}
