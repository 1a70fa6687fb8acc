//! stepman: set up step collections, query their specs and share new steps.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use stepman_registry::{FixedAnswer, Prompt, RandomAlias, StepmanHome};

use commands::share::DialoguerPrompt;
use config::StepmanConfig;

#[derive(Parser)]
#[command(name = "stepman", version, about = "Step library manager")]
struct Cli {
    /// Stepman home directory (default: ~/.stepman)
    #[arg(long, env = "STEPMAN_HOME", global = true)]
    home: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up a step collection and build its spec
    Setup {
        /// Collection URI, or a directory path with --local
        #[arg(long, short = 'c')]
        collection: String,
        /// Copy the collection from a local directory instead of cloning
        #[arg(long, overrides_with = "remote")]
        local: bool,
        /// Clone the collection even when `setup.local` is set in config.toml
        #[arg(long, overrides_with = "local")]
        remote: bool,
        /// Also copy the generated spec.json to this path
        #[arg(long)]
        copy_spec_json: Option<PathBuf>,
    },
    /// Update a collection and rebuild its spec
    Update {
        #[arg(long, short = 'c')]
        collection: String,
    },
    /// Delete a collection's route and local copy
    Delete {
        #[arg(long, short = 'c')]
        collection: String,
    },
    /// List set-up collections
    Collections {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one step of a collection
    StepInfo {
        #[arg(long, short = 'c')]
        collection: String,
        /// Step id
        #[arg(long)]
        id: String,
        /// Step version (latest if omitted)
        #[arg(long)]
        version: Option<String>,
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
    /// List the steps of a collection
    StepList {
        #[arg(long, short = 'c')]
        collection: String,
    },
    /// Share a new step version (prints a guide without a subcommand)
    Share {
        #[command(subcommand)]
        action: Option<ShareAction>,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Start sharing into a collection
    Start {
        #[arg(long, short = 'c')]
        collection: String,
    },
    /// Write a step version into the collection
    Create {
        /// Version tag of the step release
        #[arg(long)]
        tag: String,
        /// Git URI of the step repository
        #[arg(long)]
        git: String,
        /// Step id (derived from the git URI if omitted)
        #[arg(long)]
        stepid: Option<String>,
        /// Overwrite an existing step version without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Commit and push the shared step
    Finish,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "stepman=info,stepman_registry=info,stepman_spec=info",
        1 => "stepman=debug,stepman_registry=debug,stepman_spec=debug",
        _ => "stepman=trace,stepman_registry=trace,stepman_spec=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let home = resolve_home(cli.home)?;
    let config = StepmanConfig::load(&home.config_path())?;
    let git = config.git_cli();
    tracing::debug!(home = ?home.root(), "using stepman home");

    match cli.command {
        Commands::Setup {
            collection,
            local,
            remote,
            copy_spec_json,
        } => commands::setup::run(
            &home,
            &git,
            &RandomAlias,
            &collection,
            resolve_local(local, remote, config.setup.local),
            copy_spec_json.as_deref(),
        ),

        Commands::Update { collection } => commands::update::run(&home, &git, &collection),

        Commands::Delete { collection } => commands::delete::run(&home, &collection),

        Commands::Collections { json } => commands::collections::run(&home, json),

        Commands::StepInfo {
            collection,
            id,
            version,
            json,
        } => commands::step::info(&home, &collection, &id, version.as_deref(), json),

        Commands::StepList { collection } => commands::step::list(&home, &collection),

        Commands::Share { action } => match action {
            None => {
                commands::share::guide();
                Ok(())
            }
            Some(ShareAction::Start { collection }) => {
                commands::share::start(&home, &git, &collection)
            }
            Some(ShareAction::Create {
                tag,
                git: step_git,
                stepid,
                yes,
            }) => {
                let prompt: Box<dyn Prompt> = if yes {
                    Box::new(FixedAnswer(true))
                } else {
                    Box::new(DialoguerPrompt)
                };
                commands::share::create(
                    &home,
                    &git,
                    prompt.as_ref(),
                    &tag,
                    &step_git,
                    stepid.as_deref(),
                )
            }
            Some(ShareAction::Finish) => commands::share::finish(&home, &git),
        },
    }
}

/// `--local` / `--remote` win over the `setup.local` config default.
fn resolve_local(local: bool, remote: bool, configured: bool) -> bool {
    match (local, remote) {
        (true, _) => true,
        (_, true) => false,
        _ => configured,
    }
}

/// Home from `--home` / `STEPMAN_HOME`, else `~/.stepman`.
fn resolve_home(flag: Option<PathBuf>) -> anyhow::Result<StepmanHome> {
    match flag {
        Some(path) => Ok(StepmanHome::new(path)),
        None => StepmanHome::default_location()
            .ok_or_else(|| anyhow::anyhow!("cannot locate home directory, pass --home")),
    }
}
