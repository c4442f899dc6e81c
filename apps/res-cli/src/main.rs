//! # res-cli
//!
//! Command-line interface for the Resolutions tracker.
//!
//! - `res add` / `res edit` / `res complete` / `res archive`: manage goals
//! - `res log "ran 3 miles"`: record progress in plain words
//! - `res list` / `res logs` / `res stats`: see where things stand

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use res_engine::{EngineConfig, MatchingEngine};
use tracing_subscriber::EnvFilter;

/// Resolutions: track goals by describing what you did.
#[derive(Parser)]
#[command(name = "res", version, about)]
struct Cli {
    /// Data directory (defaults to ~/.resolutions).
    #[arg(long, env = "RES_HOME")]
    home: Option<PathBuf>,

    /// Log engine activity to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new goal.
    Add(commands::goal::AddArgs),
    /// Record progress. The goal is inferred from the text unless --goal is given.
    Log(commands::log::LogArgs),
    /// Show goals with progress.
    List {
        /// Include completed and archived goals.
        #[arg(long)]
        all: bool,
    },
    /// Change a goal's title, target, category, week or priority.
    Edit(commands::goal::EditArgs),
    /// Mark a goal completed.
    Complete {
        /// Goal ID or unique ID prefix.
        goal: String,
    },
    /// Archive a goal. It keeps its history but stops receiving entries.
    Archive {
        /// Goal ID or unique ID prefix.
        goal: String,
    },
    /// Show recent entries, newest first.
    Logs {
        /// Only entries for this goal.
        #[arg(long, short)]
        goal: Option<String>,
        /// Number of entries to show.
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },
    /// Activity summary across all goals.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they don't mix with command output.
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let home = match cli.home {
        Some(home) => home,
        None => EngineConfig::default_home().context("no home directory; pass --home")?,
    };
    let config = EngineConfig::load_or_default(&home)?;
    tracing::info!(home = %home.display(), "using data directory");
    let engine = MatchingEngine::open(config)?;

    match cli.command {
        Commands::Add(args) => commands::goal::add(&engine, args).await,
        Commands::Log(args) => commands::log::execute(&engine, args).await,
        Commands::List { all } => commands::goal::list(&engine, all).await,
        Commands::Edit(args) => commands::goal::edit(&engine, args).await,
        Commands::Complete { goal } => commands::goal::complete(&engine, &goal).await,
        Commands::Archive { goal } => commands::goal::archive(&engine, &goal).await,
        Commands::Logs { goal, limit } => {
            commands::log::recent(&engine, goal.as_deref(), limit).await
        }
        Commands::Stats => commands::stats::execute(&engine).await,
    }
}
