use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "upscale-pipeline")]
#[command(version, about = "Resumable texture upscaling without alpha halos")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding `.pipeline/` and `files/` (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Config file to use instead of `.pipeline/config.toml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run phases in dependency order (all phases when none are named)
    Run {
        /// Phases to run
        phases: Vec<String>,

        /// Re-execute phases already marked completed
        #[arg(long)]
        rerun: bool,

        /// Mark phases completed without executing them
        #[arg(long)]
        dry_run: bool,
    },
    /// List phases and their dependencies
    List,
    /// Show the recorded status of every phase
    Status,
    /// Clear recorded status so phases run again
    Reset {
        /// Phases to reset
        phases: Vec<String>,

        /// Reset every phase
        #[arg(long, conflicts_with = "phases")]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show the inference device the enhancer would use
    Device,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default config.toml
    Init,
}

/// Console logging plus, when `log_dir` is given, a daily rolling file.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_dir = log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pipeline.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Only runs write a log file; the directory comes from the configured root.
    let log_dir = match &cli.command {
        Commands::Run { .. } => upscale_pipeline::config::Config::new(
            project_dir.clone(),
            cli.config.clone(),
            cli.verbose,
        )
        .ok()
        .map(|c| c.paths.log_dir),
        _ => None,
    };
    let _guard = init_tracing(cli.verbose, log_dir.as_deref());

    match &cli.command {
        Commands::Run {
            phases,
            rerun,
            dry_run,
        } => {
            cmd::cmd_run(&cli, project_dir, phases, *rerun, *dry_run).await?;
        }
        Commands::List => cmd::cmd_list()?,
        Commands::Status => cmd::cmd_status(&cli, project_dir)?,
        Commands::Reset { phases, all, force } => {
            cmd::cmd_reset(&cli, project_dir, phases, *all, *force)?
        }
        Commands::Config { command } => cmd::cmd_config(&cli, project_dir, command.clone())?,
        Commands::Device => cmd::cmd_device(&cli, project_dir).await?,
    }

    Ok(())
}
