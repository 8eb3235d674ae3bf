//! annoflow CLI: run YAML-defined annotation pipelines over text files and
//! export their provenance.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// annoflow: keyed annotation pipelines with provenance
#[derive(Parser, Debug)]
#[command(name = "annoflow", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (where annoflow.toml is looked up)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a pipeline definition over text files
    Run(RunArgs),
    /// List the registered operations
    Ops,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct RunArgs {
    /// YAML pipeline definition
    #[arg(short, long)]
    pipeline: PathBuf,

    /// Text files, one document each
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write the provenance graph as Graphviz DOT
    #[arg(long)]
    prov_dot: Option<PathBuf>,

    /// Write the provenance graph as JSON
    #[arg(long)]
    prov_json: Option<PathBuf>,

    /// Sub-pipeline expansion depth for the DOT export (default: expand all)
    #[arg(long)]
    depth: Option<usize>,

    /// Seed for reproducible ids
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default annoflow.toml in the workspace
    Init,
    /// Show the resolved configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = annoflow_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Human-readable stderr, plus JSON file logging when enabled
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter(cli.verbose, cli.quiet, &config.logging.level));

    let mut _guard = None;
    let json_layer = if config.logging.json_log {
        let log_dir = directories::ProjectDirs::from("dev", "annoflow", "annoflow")
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("."));
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "annoflow.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug")),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, &workspace, config)
}

/// Flags win over `RUST_LOG`, which wins over the configured level.
fn stderr_filter(verbose: u8, quiet: bool, level: &str) -> EnvFilter {
    match verbose {
        0 if quiet => EnvFilter::new("error"),
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}
