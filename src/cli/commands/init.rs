//! `spectrack init` command - Initialize a new spectrack project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::core::context::AppContext;
use crate::core::project::{Project, ProjectError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Rewrite the default config even if .spectrack/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    match project {
        Ok(project) => {
            // Opening the context creates the store and its schema
            let ctx = AppContext::open(project)?;
            println!(
                "{} Initialized spectrack project at {}",
                style("✓").green(),
                style(ctx.project.root().display()).cyan()
            );
            println!();
            println!("Created project structure:");
            print_structure(ctx.project.root());
            println!();
            println!("Next steps:");
            println!(
                "  {} Create your first spec",
                style("spectrack spec new \"<name>\"").yellow()
            );
            println!(
                "  {} Check documents against the store",
                style("spectrack check").yellow()
            );
            println!(
                "  {} Configure GitHub sync",
                style(".spectrack/config.yaml").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} spectrack project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to rewrite the default config",
                style("spectrack init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_structure(root: &Path) {
    let entries = [
        ".spectrack/",
        ".spectrack/config.yaml",
        ".spectrack/store.db",
        ".spectrack/backups/",
        "specs/",
    ];

    for entry in entries {
        if root.join(entry).exists() {
            let prefix = if entry.ends_with('/') { "📁" } else { "📄" };
            println!("  {} {}", prefix, style(entry).dim());
        }
    }
}
