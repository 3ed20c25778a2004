//! `spectrack validate` command - Strict header validation

use console::style;
use miette::Result;

use crate::cli::commands::normalize::target_paths;
use crate::cli::helpers::open_context;
use crate::cli::GlobalOpts;
use crate::core::document::validate_file;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Spec id or prefix (default: every document)
    pub id: Option<String>,
}

/// Validation statistics
#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let paths = target_paths(&ctx, args.id.as_deref())?;
    let mut stats = ValidationStats::default();

    for path in &paths {
        stats.files_checked += 1;
        let issues = validate_file(path)?;
        if issues.is_empty() {
            stats.files_passed += 1;
            continue;
        }

        stats.files_failed += 1;
        stats.total_errors += issues.len();
        println!("{} {}", style("✗").red(), path.display());
        for issue in &issues {
            println!("    {}", style(issue).yellow());
        }
    }

    if !global.quiet {
        println!();
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", style("Validation Summary").bold());
        println!("{}", style("─".repeat(60)).dim());
        println!("  Files checked:  {}", style(stats.files_checked).cyan());
        println!("  Files passed:   {}", style(stats.files_passed).green());
        println!("  Files failed:   {}", style(stats.files_failed).red());
        println!("  Total errors:   {}", style(stats.total_errors).red());
        println!();
    }

    match stats.files_failed {
        0 => {
            if !global.quiet {
                println!("{} All documents passed validation!", style("✓").green().bold());
            }
            Ok(())
        }
        1 => Err(miette::miette!(
            help = "`spectrack normalize --write` fixes formatting drift",
            "Validation failed: 1 document has errors"
        )),
        n => Err(miette::miette!(
            help = "`spectrack normalize --write` fixes formatting drift",
            "Validation failed: {} documents have errors",
            n
        )),
    }
}
