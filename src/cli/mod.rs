use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};

pub mod commands;

use self::commands::{SampleArgs, SearchArgs};

#[derive(Parser, Debug)]
#[command(
    name = "journaltui",
    version,
    about = "Terminal journal with scroll-anchored timelines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over JOURNALTUI_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over JOURNALTUI_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Load a simulated page of entries and print the ones matching a term
    Search(SearchArgs),
    /// Print a simulated page of entries as JSON
    Sample(SampleArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let command = cli.command.unwrap_or(Commands::Tui);

    // The alternate screen owns stdout/stderr while the TUI runs.
    let log_target = match command {
        Commands::Tui => LogTarget::File(loader.paths().log_file()),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, &log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);
    tracing::debug!(config = %loader.paths().config_file.display(), "configuration loaded");

    match command {
        Commands::Tui => {
            let mut app = App::new(config);
            commands::run_tui(&mut app)
        }
        Commands::Search(args) => commands::search_entries(config, args),
        Commands::Sample(args) => commands::print_sample(config, args),
    }
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(path) => {
                let file = open_log_file(path)?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init()
            }
        }
        Ok(())
    })
    .map(|_| ())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
