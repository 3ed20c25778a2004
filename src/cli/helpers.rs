//! Shared helper functions for CLI commands

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::context::AppContext;
use crate::core::integrity;
use crate::core::project::Project;

/// Discover the project (or use `--project`) and open its context
pub fn open_context(global: &GlobalOpts) -> Result<AppContext> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path)?,
        None => Project::discover()?,
    };
    Ok(AppContext::open(project)?)
}

/// Resolve a full spec id from an exact id or a unique prefix
///
/// Candidates are the union of document and store ids, so orphans on either
/// side can still be addressed.
pub fn resolve_spec_id(ctx: &AppContext, input: &str) -> Result<String> {
    let mut ids = integrity::document_ids(ctx.documents_dir())?;
    ids.extend(ctx.store.spec_ids()?);

    if ids.contains(input) {
        return Ok(input.to_string());
    }

    let matches: Vec<&String> = ids.iter().filter(|id| id.starts_with(input)).collect();
    match matches.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(miette::miette!(
            help = "run `spectrack spec list` to see spec ids",
            "no spec matches '{}'",
            input
        )),
        many => Err(miette::miette!(
            help = "use a longer prefix",
            "'{}' is ambiguous ({} specs match)",
            input,
            many.len()
        )),
    }
}

/// Format an id for display, truncating if too long
///
/// UUIDs are shortened to their first 8 characters, which is usually enough
/// to address a spec by prefix.
pub fn format_short_id(id: &str) -> String {
    if id.len() > 16 {
        id[..8].to_string()
    } else {
        id.to_string()
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a serializable value as JSON or YAML; returns false for other formats
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Print a success line unless quiet
pub fn success(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}
