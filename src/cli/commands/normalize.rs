//! `spectrack normalize` command - Fix header formatting drift

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::{open_context, resolve_spec_id, success};
use crate::cli::GlobalOpts;
use crate::core::context::AppContext;
use crate::core::document;
use crate::core::integrity;

#[derive(clap::Args, Debug)]
pub struct NormalizeArgs {
    /// Spec id or prefix (default: every document)
    pub id: Option<String>,

    /// Write the normalized text back (default: show the diff only)
    #[arg(long, short = 'w')]
    pub write: bool,
}

pub fn run(args: NormalizeArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let paths = target_paths(&ctx, args.id.as_deref())?;

    let mut changed = 0usize;
    let mut written = 0usize;
    for path in &paths {
        let text = document::read_text(path)?;
        let report = document::normalize(&text);
        for skipped in &report.skipped {
            eprintln!(
                "{} {}:{}: left as is, a later line sets the same field ({})",
                style("!").yellow(),
                path.display(),
                skipped.line,
                skipped.before
            );
        }
        if report.is_clean() {
            continue;
        }
        changed += 1;

        if !global.quiet {
            println!("{}", style(path.display()).bold());
            for line in report.diff().lines() {
                let styled = if line.starts_with('+') {
                    style(line).green()
                } else if line.starts_with('-') {
                    style(line).red()
                } else {
                    style(line).dim()
                };
                println!("  {}", styled);
            }
        }

        if args.write {
            document::write_text(path, &report.output)?;
            written += 1;
        }
    }

    if changed == 0 {
        success(global, format!("{} document(s) already canonical", paths.len()));
    } else if args.write {
        success(global, format!("Normalized {} document(s)", written));
    } else if !global.quiet {
        println!();
        println!(
            "{} document(s) need normalizing; rerun with {} to apply",
            style(changed).yellow(),
            style("--write").yellow()
        );
    }
    Ok(())
}

/// Documents to process: one resolved spec, or everything in the documents dir
pub(crate) fn target_paths(ctx: &AppContext, id: Option<&str>) -> Result<Vec<PathBuf>> {
    let dir = ctx.documents_dir();
    let ids = match id {
        Some(input) => vec![resolve_spec_id(ctx, input)?],
        None => integrity::document_ids(dir)?.into_iter().collect(),
    };
    Ok(ids
        .iter()
        .map(|id| document::document_path(dir, id))
        .filter(|path| path.is_file())
        .collect())
}
