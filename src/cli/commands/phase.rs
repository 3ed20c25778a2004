//! `spectrack phase` command - Move specs through the lifecycle

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_context, print_structured, resolve_spec_id, success};
use crate::cli::GlobalOpts;
use crate::core::lifecycle::{self, AdvanceOptions};
use crate::core::phase::Phase;
use crate::core::phase_gate::GateResult;

#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Advance a spec to the target phase
    Advance {
        /// Spec id or unique prefix
        id: String,

        /// Target phase
        target: Phase,

        /// Skip the sequence check and the completion checks
        #[arg(long)]
        force: bool,
    },

    /// Report whether a spec is ready for the target phase
    Check {
        /// Spec id or unique prefix
        id: String,

        /// Target phase
        target: Phase,
    },
}

pub fn run(cmd: PhaseCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PhaseCommands::Advance { id, target, force } => run_advance(&id, target, force, global),
        PhaseCommands::Check { id, target } => run_check(&id, target, global),
    }
}

fn run_advance(input: &str, target: Phase, force: bool, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let id = resolve_spec_id(&ctx, input)?;
    let outcome = lifecycle::advance_phase(&ctx, &id, target, AdvanceOptions { force })?;

    if print_structured(&outcome, global.format)? {
        return Ok(());
    }

    if outcome.gate == GateResult::Bypassed && !global.quiet {
        println!("{} completion checks skipped", style("!").yellow());
    }
    success(
        global,
        format!(
            "{} {} → {}",
            style(&outcome.record.name).bold(),
            style(outcome.from).dim(),
            style(outcome.to).green()
        ),
    );
    if outcome.workflow_cleared && !global.quiet {
        println!("  workflow cursor cleared");
    }
    Ok(())
}

fn run_check(input: &str, target: Phase, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let id = resolve_spec_id(&ctx, input)?;
    let gate = lifecycle::check_transition(&ctx, &id, target)?;

    if print_structured(&gate, global.format)? {
        return Ok(());
    }

    match gate {
        GateResult::Allowed => {
            success(global, format!("ready for {}", style(target).green()));
            Ok(())
        }
        GateResult::Bypassed => {
            success(global, format!("checks bypassed for {}", style(target).yellow()));
            Ok(())
        }
        GateResult::NeedsCompletion { missing, .. } => {
            println!("{} not ready for {}:", style("✗").red(), style(target).yellow());
            for item in &missing {
                println!("    {}", style(item).yellow());
            }
            Err(miette::miette!(
                "{} item(s) to complete before '{}'",
                missing.len(),
                target
            ))
        }
    }
}
