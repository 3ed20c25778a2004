use clap::Parser;
use miette::Result;
use spectrack::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    match cli.command {
        Commands::Init(args) => spectrack::cli::commands::init::run(args),
        Commands::Spec(cmd) => spectrack::cli::commands::spec::run(cmd, &global),
        Commands::Check(args) => spectrack::cli::commands::check::run(args, &global),
        Commands::Repair(args) => spectrack::cli::commands::repair::run(args, &global),
        Commands::Normalize(args) => spectrack::cli::commands::normalize::run(args, &global),
        Commands::Validate(args) => spectrack::cli::commands::validate::run(args, &global),
        Commands::Phase(cmd) => spectrack::cli::commands::phase::run(cmd, &global),
        Commands::Remote(cmd) => spectrack::cli::commands::remote::run(cmd, &global),
        Commands::Workflow(cmd) => spectrack::cli::commands::workflow::run(cmd, &global),
        Commands::Store(cmd) => spectrack::cli::commands::store::run(cmd, &global),
        Commands::Completions(args) => spectrack::cli::commands::completions::run(args),
    }
}

/// Logs go to stderr; `SPECTRACK_LOG` overrides the level chosen by `-v`
fn init_tracing(global: &GlobalOpts) {
    let default_level = if global.verbose {
        "spectrack=debug"
    } else {
        "spectrack=warn"
    };
    let filter =
        EnvFilter::try_from_env("SPECTRACK_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
