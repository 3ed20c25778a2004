//! `spectrack workflow` command - Resumable task cursor per spec

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_context, print_structured, resolve_spec_id, success};
use crate::cli::GlobalOpts;
use crate::core::document::format_timestamp;
use crate::core::store::{EntityType, NextAction, WorkflowState};

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// Save where work on a spec stands
    Save {
        /// Spec id or unique prefix
        id: String,

        /// Current task number
        #[arg(long, short = 't')]
        task: Option<u32>,

        /// Current task title
        #[arg(long)]
        title: Option<String>,

        /// What happens next
        #[arg(long, short = 'n', default_value = "none")]
        next: NextAction,

        /// Remote issue for the task (default: the spec's linked issue)
        #[arg(long)]
        issue: Option<u64>,
    },

    /// Show the saved cursor for a spec
    Show {
        /// Spec id or unique prefix
        id: String,
    },

    /// Drop the saved cursor for a spec
    Clear {
        /// Spec id or unique prefix
        id: String,
    },
}

pub fn run(cmd: WorkflowCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;

    match cmd {
        WorkflowCommands::Save {
            id,
            task,
            title,
            next,
            issue,
        } => {
            let id = resolve_spec_id(&ctx, &id)?;
            if ctx.store.find_spec(&id)?.is_none() {
                return Err(miette::miette!(
                    help = "run `spectrack repair` to import the document first",
                    "spec '{}' is not in the store",
                    id
                ));
            }
            let remote_issue_number = match issue {
                Some(n) => Some(n),
                None => ctx
                    .store
                    .active_link(EntityType::Spec, &id)?
                    .and_then(|link| link.issue_number),
            };
            let state = WorkflowState {
                spec_id: id.clone(),
                current_task_number: task,
                current_task_title: title,
                next_action: next,
                remote_issue_number,
                saved_at: Utc::now(),
            };
            ctx.store.save_workflow_state(&state)?;
            if !print_structured(&state, global.format)? {
                success(global, format!("Saved workflow state for {}", style(&id).cyan()));
            }
        }

        WorkflowCommands::Show { id } => {
            let id = resolve_spec_id(&ctx, &id)?;
            let state = ctx.store.get_workflow_state(&id)?;
            if print_structured(&state, global.format)? {
                return Ok(());
            }
            match state {
                Some(state) => {
                    println!("{}", style(&state.spec_id).cyan());
                    println!(
                        "  Task:   {} {}",
                        state
                            .current_task_number
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        state.current_task_title.unwrap_or_default()
                    );
                    println!("  Next:   {}", style(state.next_action).yellow());
                    if let Some(issue) = state.remote_issue_number {
                        println!("  Issue:  #{}", issue);
                    }
                    println!("  Saved:  {}", format_timestamp(&state.saved_at));
                }
                None => println!("No workflow state saved for {}", style(&id).cyan()),
            }
        }

        WorkflowCommands::Clear { id } => {
            let id = resolve_spec_id(&ctx, &id)?;
            if ctx.store.delete_workflow_state(&id)? {
                success(global, format!("Cleared workflow state for {}", style(&id).cyan()));
            } else {
                success(global, format!("No workflow state for {}", style(&id).cyan()));
            }
        }
    }
    Ok(())
}
