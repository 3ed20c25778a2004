//! `spectrack spec` command - Create, list and show specs

use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{
    format_short_id, open_context, print_structured, resolve_spec_id, success, truncate_str,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::document::{self, format_timestamp, SpecDocument};
use crate::core::lifecycle;
use crate::core::phase::Phase;
use crate::core::store::EntityType;

#[derive(Subcommand, Debug)]
pub enum SpecCommands {
    /// Create a new spec document in the requirements phase
    New {
        /// Spec name (becomes the document title)
        name: String,

        /// One-line description
        #[arg(long, short = 'd')]
        description: Option<String>,

        /// Working branch for the spec
        #[arg(long, short = 'b')]
        branch: Option<String>,
    },

    /// List specs from the store
    List {
        /// Only specs in this phase
        #[arg(long, short = 'p')]
        phase: Option<Phase>,
    },

    /// Show a spec with its link and workflow state
    Show {
        /// Spec id or unique prefix
        id: String,
    },
}

pub fn run(cmd: SpecCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        SpecCommands::New {
            name,
            description,
            branch,
        } => run_new(&name, description.as_deref(), branch.as_deref(), global),
        SpecCommands::List { phase } => run_list(phase, global),
        SpecCommands::Show { id } => run_show(&id, global),
    }
}

fn run_new(
    name: &str,
    description: Option<&str>,
    branch: Option<&str>,
    global: &GlobalOpts,
) -> Result<()> {
    let ctx = open_context(global)?;
    let doc = lifecycle::create_spec(&ctx, name, description, branch)?;

    if global.format == OutputFormat::Id {
        println!("{}", doc.metadata.id);
        return Ok(());
    }
    success(
        global,
        format!(
            "Created spec {} {}",
            style(&doc.metadata.id).cyan(),
            style(&doc.metadata.name).bold()
        ),
    );
    if !global.quiet {
        println!("  {}", style(doc.path.display()).dim());
    }
    Ok(())
}

fn run_list(phase: Option<Phase>, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    ctx.auto_check();

    let specs = match phase {
        Some(phase) => ctx.store.list_specs_in_phase(phase)?,
        None => ctx.store.list_specs()?,
    };

    if print_structured(&specs, global.format)? {
        return Ok(());
    }

    match global.format {
        OutputFormat::Id => {
            for spec in &specs {
                println!("{}", spec.id);
            }
        }
        OutputFormat::Tsv => {
            for spec in &specs {
                println!(
                    "{}\t{}\t{}\t{}",
                    spec.id,
                    spec.phase,
                    spec.name,
                    format_timestamp(&spec.updated_at)
                );
            }
        }
        _ => {
            if specs.is_empty() {
                println!("No specs found.");
                return Ok(());
            }
            let mut table = Builder::default();
            table.push_record(["ID", "Phase", "Name", "Updated", "Issue"]);
            for spec in &specs {
                let issue = ctx
                    .store
                    .active_link(EntityType::Spec, &spec.id)?
                    .and_then(|link| link.issue_number)
                    .map(|n| format!("#{}", n))
                    .unwrap_or_default();
                table.push_record([
                    format_short_id(&spec.id),
                    spec.phase.to_string(),
                    truncate_str(&spec.name, 40),
                    format_timestamp(&spec.updated_at),
                    issue,
                ]);
            }
            println!("{}", table.build().with(Style::markdown()));
            if !global.quiet {
                println!("{} spec(s) found", style(specs.len()).cyan());
            }
        }
    }
    Ok(())
}

fn run_show(input: &str, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    ctx.auto_check();
    let id = resolve_spec_id(&ctx, input)?;

    let record = ctx.store.find_spec(&id)?;
    if print_structured(&record, global.format)? {
        return Ok(());
    }

    let doc = SpecDocument::load_for_id(ctx.documents_dir(), &id);
    let link = ctx.store.active_link(EntityType::Spec, &id)?;
    let workflow = ctx.store.get_workflow_state(&id)?;

    match (&doc, &record) {
        (Ok(doc), _) => {
            let meta = &doc.metadata;
            println!("{}", style(&meta.name).bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  ID:       {}", style(&meta.id).cyan());
            println!("  Phase:    {}", style(meta.phase).yellow());
            println!("  Created:  {}", format_timestamp(&meta.created_at));
            println!("  Updated:  {}", format_timestamp(&meta.updated_at));
            if let Some(description) = &meta.description {
                println!("  About:    {}", description);
            }
            if let Some(branch) = &meta.branch_name {
                println!("  Branch:   {}", branch);
            }
            println!("  Document: {}", style(doc.path.display()).dim());
        }
        (Err(e), Some(record)) => {
            println!("{}", style(&record.name).bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  ID:       {}", style(&record.id).cyan());
            println!("  Phase:    {}", style(record.phase).yellow());
            println!(
                "  {} document unreadable: {}",
                style("!").yellow(),
                e
            );
        }
        (Err(_), None) => {
            return Err(miette::miette!(
                "spec '{}' has neither a readable document nor a store record",
                id
            ));
        }
    }

    match &record {
        Some(record) => {
            if let Ok(doc) = &doc {
                if !record.matches_document(&doc.metadata) {
                    println!(
                        "  {} store record differs from document; run {}",
                        style("!").yellow(),
                        style("spectrack repair").yellow()
                    );
                }
            }
        }
        None => println!(
            "  {} not in store; run {}",
            style("!").yellow(),
            style("spectrack repair").yellow()
        ),
    }

    println!();
    match link {
        Some(link) => {
            println!(
                "  Issue:    #{} {}",
                link.issue_number.unwrap_or_default(),
                style(link.issue_url.unwrap_or_default()).dim()
            );
            if let Some(synced) = link.last_synced_at {
                println!("  Synced:   {}", format_timestamp(&synced));
            }
            if let Some(error) = link.error_message {
                println!("  {} last sync failed: {}", style("!").red(), error);
            }
            if let Some(pr) = link.pr_number {
                let merged = if link.pr_merged_at.is_some() { " (merged)" } else { "" };
                println!("  PR:       #{}{}", pr, merged);
            }
        }
        None => println!("  Issue:    {}", style("not linked").dim()),
    }

    if let Some(state) = workflow {
        println!(
            "  Cursor:   task {} {} (next: {})",
            state
                .current_task_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state.current_task_title.unwrap_or_default(),
            state.next_action
        );
    }

    if let Ok(doc) = &doc {
        let issues = document::validate(&doc.content);
        if !issues.is_empty() && !global.quiet {
            println!();
            println!("  {} header issues (see `spectrack validate`):", style("!").yellow());
            for issue in issues {
                println!("    - {}", issue);
            }
        }
    }
    Ok(())
}
