mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exit status used when the user interrupts a run with Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "oak",
    about = "Install and maintain AI agent commands, skills and IDE settings in a project",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .oak/ or .git/)
    #[arg(long, global = true, env = "OAK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log every stage as it runs
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install oak, or change the agents, IDEs and features of an existing install
    Init {
        /// Reinstall everything even if .oak/ already exists
        #[arg(long)]
        force: bool,

        /// Agent to configure (repeatable; default: keep current selection)
        #[arg(long = "agent", short = 'a')]
        agents: Vec<String>,

        /// IDE to configure (repeatable)
        #[arg(long = "ide", short = 'i')]
        ides: Vec<String>,

        /// Feature to enable (repeatable; default on fresh install: all)
        #[arg(long = "feature", short = 'f')]
        features: Vec<String>,

        /// Never prompt; use defaults for anything not given
        #[arg(long)]
        no_interactive: bool,
    },

    /// Bring installed commands, settings and skills up to this version
    Upgrade {
        /// Only upgrade agent commands
        #[arg(long)]
        commands: bool,

        /// Only upgrade IDE settings and skills
        #[arg(long)]
        templates: bool,

        /// Show the plan without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Remove everything oak installed, keeping files you changed
    Remove {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,

        /// Leave IDE settings files untouched
        #[arg(long)]
        keep_ide_settings: bool,
    },

    /// Show configured selections and tracked assets
    Status,
}

fn install_interrupt_handler() -> anyhow::Result<()> {
    use signal_hook::consts::signal::SIGINT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT])?;
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            eprintln!("\ninterrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
    });
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = install_interrupt_handler() {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            force,
            agents,
            ides,
            features,
            no_interactive,
        } => cmd::init::run(
            &root,
            cmd::init::InitArgs {
                force,
                agents,
                ides,
                features,
                interactive: !no_interactive && cmd::is_interactive(),
            },
            cli.json,
        ),
        Commands::Upgrade {
            commands,
            templates,
            dry_run,
            force,
        } => cmd::upgrade::run(
            &root,
            cmd::upgrade::UpgradeArgs {
                commands,
                templates,
                dry_run,
                force,
            },
            cli.json,
        ),
        Commands::Remove {
            force,
            keep_ide_settings,
        } => cmd::remove::run(&root, force, keep_ide_settings, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
