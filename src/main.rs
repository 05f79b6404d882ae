use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deviate::cancel::CancellationToken;
use deviate::config::{Config, Project, DEFAULT_CONFIG_FILE};
use deviate::git::Git2Repository;
use deviate::github::GhCli;
use deviate::sync::Operation;
use deviate::{ui, DeviateError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "deviate",
    version,
    about = "Keep a fork's main and release branches in sync with upstream"
)]
struct Args {
    #[arg(
        long,
        global = true,
        help = "Configuration file path [default: <cwd>/.deviate.yaml]"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronize the fork with its upstream
    Sync {
        /// Working copy to synchronize [default: directory of the config file]
        repository: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::display_error(&err);
            let code = err
                .downcast_ref::<DeviateError>()
                .map(DeviateError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel.cancel_on_signal()?;

    let config_path = match args.config {
        Some(path) => path,
        None => std::env::current_dir()
            .context("cannot determine the working directory")?
            .join(DEFAULT_CONFIG_FILE),
    };

    match args.command {
        Command::Sync { repository } => sync(Project::new(config_path, repository), cancel),
    }
}

fn sync(project: Project, cancel: CancellationToken) -> Result<()> {
    let repository = Git2Repository::open(&project.path, cancel.clone())?;
    let config = Config::load(&project, &repository)?;
    let github = GhCli::new(&project.path, cancel.clone());

    let operation = Operation::new(config, project, repository, github, cancel)?;
    operation.run()?;

    ui::display_success("Fork synchronized");
    Ok(())
}
