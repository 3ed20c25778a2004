//! `spectrack check` command - Compare documents against the store

use console::style;
use miette::Result;

use crate::cli::helpers::{format_short_id, open_context, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::integrity::{self, IntegrityReport};

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Exit with an error when any inconsistency is found
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let report = integrity::check(&ctx.store, ctx.documents_dir())?;

    if !print_structured(&report, global.format)? {
        match global.format {
            OutputFormat::Id | OutputFormat::Tsv => print_tsv(&report),
            _ => print_report(&report, global.quiet),
        }
    }

    if args.strict && !report.is_consistent() {
        return Err(miette::miette!(
            help = "run `spectrack repair` to reconcile the store",
            "{} spec(s) out of sync",
            report.problem_count()
        ));
    }
    Ok(())
}

fn print_tsv(report: &IntegrityReport) {
    for id in &report.files_only {
        println!("files_only\t{}", id);
    }
    for id in &report.store_only {
        println!("store_only\t{}", id);
    }
    for entry in &report.mismatch {
        println!("mismatch\t{}\t{}", entry.id, entry.differences.join("; "));
    }
}

fn print_report(report: &IntegrityReport, quiet: bool) {
    if !report.files_only.is_empty() {
        println!(
            "{} {} document(s) missing from the store",
            style("?").yellow(),
            report.files_only.len()
        );
        for id in &report.files_only {
            println!("    {}", style(id).cyan());
        }
    }

    if !report.store_only.is_empty() {
        println!(
            "{} {} store record(s) without a document",
            style("✗").red(),
            report.store_only.len()
        );
        for id in &report.store_only {
            println!("    {}", style(id).cyan());
        }
    }

    if !report.mismatch.is_empty() {
        println!(
            "{} {} spec(s) differ between document and store",
            style("!").yellow(),
            report.mismatch.len()
        );
        for entry in &report.mismatch {
            println!("    {}", style(format_short_id(&entry.id)).cyan());
            for diff in &entry.differences {
                println!("      {}", style(diff).yellow());
            }
        }
    }

    if quiet {
        return;
    }

    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Integrity Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  In sync:        {}", style(report.synced.len()).green());
    println!("  Files only:     {}", style(report.files_only.len()).yellow());
    println!("  Store only:     {}", style(report.store_only.len()).red());
    println!("  Mismatched:     {}", style(report.mismatch.len()).yellow());
    println!("  Sync rate:      {}%", style(report.sync_rate).cyan());
    println!();

    if report.is_consistent() {
        println!(
            "{} Documents and store are consistent",
            style("✓").green().bold()
        );
    } else {
        println!(
            "Run {} to reconcile the store from the documents.",
            style("spectrack repair").yellow()
        );
    }
}
