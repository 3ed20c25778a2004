//! `spectrack remote` command - Link and sync specs with GitHub issues

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_context, print_structured, resolve_spec_id, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::document::format_timestamp;
use crate::core::remote::LinkRequest;

#[derive(Subcommand, Debug)]
pub enum RemoteCommands {
    /// Link a spec to a GitHub issue
    Link {
        /// Spec id or unique prefix
        id: String,

        /// Link this existing issue number
        #[arg(long, conflicts_with = "create")]
        issue: Option<u64>,

        /// Create a new issue (or adopt one already carrying the spec id)
        #[arg(long)]
        create: bool,
    },

    /// Push spec title, body and state to the linked issue
    Push {
        /// Spec id or unique prefix
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Push every linked spec
        #[arg(long)]
        all: bool,
    },

    /// Pull issue title and state into the spec
    Pull {
        /// Spec id or unique prefix
        id: String,
    },

    /// Open a pull request for a linked spec
    Pr {
        /// Spec id or unique prefix
        id: String,

        /// Branch with the changes
        #[arg(long)]
        head: String,

        /// Branch to merge into (default: github.base_branch)
        #[arg(long)]
        base: Option<String>,
    },

    /// Refresh the merge status of a spec's pull request
    PrStatus {
        /// Spec id or unique prefix
        id: String,
    },
}

pub fn run(cmd: RemoteCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    ctx.auto_check();
    let tracker = ctx.tracker()?;
    let remote = ctx.remote(&tracker);

    match cmd {
        RemoteCommands::Link { id, issue, create } => {
            let id = resolve_spec_id(&ctx, &id)?;
            let request = LinkRequest {
                existing_issue: issue,
                create_if_not_exists: create || issue.is_none(),
            };
            let link = remote.create_link(&id, &request)?;
            if print_structured(&link, global.format)? {
                return Ok(());
            }
            success(
                global,
                format!(
                    "Linked {} to issue #{} {}",
                    style(&id).cyan(),
                    link.issue_number.unwrap_or_default(),
                    style(link.issue_url.unwrap_or_default()).dim()
                ),
            );
        }

        RemoteCommands::Push { id: Some(id), .. } => {
            let id = resolve_spec_id(&ctx, &id)?;
            let link = remote.sync_to_remote(&id)?;
            if print_structured(&link, global.format)? {
                return Ok(());
            }
            success(
                global,
                format!(
                    "Pushed {} to issue #{}",
                    style(&id).cyan(),
                    link.issue_number.unwrap_or_default()
                ),
            );
        }

        RemoteCommands::Push { id: None, .. } => {
            let outcome = remote.sync_all_to_remote()?;
            if print_structured(&outcome, global.format)? {
                return Ok(());
            }
            if global.format == OutputFormat::Id {
                for id in &outcome.pushed {
                    println!("{}", id);
                }
            }
            for (id, error) in &outcome.failed {
                println!("{} {}: {}", style("✗").red(), style(id).cyan(), error);
            }
            success(
                global,
                format!(
                    "Pushed {} spec(s), {} failed",
                    outcome.pushed.len(),
                    outcome.failed.len()
                ),
            );
            if !outcome.failed.is_empty() {
                return Err(miette::miette!(
                    help = "failures are safe to retry with `spectrack remote push`",
                    "{} spec(s) failed to sync",
                    outcome.failed.len()
                ));
            }
        }

        RemoteCommands::Pull { id } => {
            let id = resolve_spec_id(&ctx, &id)?;
            let outcome = remote.sync_from_remote(&id)?;
            if print_structured(&outcome, global.format)? {
                return Ok(());
            }
            if outcome.changed() {
                success(
                    global,
                    format!(
                        "Updated {}: {} ({})",
                        style(&id).cyan(),
                        style(&outcome.spec.name).bold(),
                        style(outcome.spec.phase).yellow()
                    ),
                );
            } else {
                success(global, format!("{} already up to date", style(&id).cyan()));
            }
        }

        RemoteCommands::Pr { id, head, base } => {
            let id = resolve_spec_id(&ctx, &id)?;
            let base = base.unwrap_or_else(|| ctx.config.github.base_branch.clone());
            let pr = remote.create_pull_request(&id, &head, &base)?;
            if print_structured(&pr, global.format)? {
                return Ok(());
            }
            success(
                global,
                format!(
                    "Opened pull request #{} {}",
                    pr.number,
                    style(&pr.url).dim()
                ),
            );
        }

        RemoteCommands::PrStatus { id } => {
            let id = resolve_spec_id(&ctx, &id)?;
            let pr = remote.refresh_pr_status(&id)?;
            if print_structured(&pr, global.format)? {
                return Ok(());
            }
            let merged = pr
                .merged_at
                .map(|at| format!(" at {}", format_timestamp(&at)))
                .unwrap_or_default();
            println!(
                "PR #{} {}{} {}",
                pr.number,
                style(pr.state).yellow(),
                merged,
                style(&pr.url).dim()
            );
        }
    }
    Ok(())
}
