//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// subforward - forward ingested writes to subscription destinations
#[derive(Parser, Debug)]
#[command(
    name = "subforward",
    author,
    version,
    about = "Subscription write forwarder",
    long_about = "Replicates writes to the destinations subscribed to their database and \n\
                  retention policy.\n\n\
                  Loads the forwarder settings and a subscription catalog, keeps one \n\
                  writer per subscription and forwards line protocol read from stdin."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SUBFORWARD_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SUBFORWARD_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the forwarder
    Run(RunArgs),

    /// Validate settings and catalog without running
    Validate(ValidateArgs),

    /// Display the subscription table
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to forwarder settings (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "subscriber.toml",
        env = "SUBFORWARD_CONFIG"
    )]
    pub config: PathBuf,

    /// Path to the subscription catalog (TOML or JSON); reloaded on SIGHUP
    #[arg(long, default_value = "catalog.toml", env = "SUBFORWARD_CATALOG")]
    pub catalog: PathBuf,

    /// Database stdin writes belong to (stdin is ignored when unset)
    #[arg(long, env = "SUBFORWARD_DB")]
    pub db: Option<String>,

    /// Retention policy stdin writes belong to (empty = database default)
    #[arg(long, default_value = "", env = "SUBFORWARD_RP")]
    pub rp: String,

    /// Lines per forwarded batch
    #[arg(long, default_value = "100", env = "SUBFORWARD_BATCH_LINES")]
    pub batch_lines: usize,

    /// Flush a partial batch after this many milliseconds
    #[arg(long, default_value = "1000", env = "SUBFORWARD_FLUSH_MS")]
    pub flush_ms: u64,

    /// Validate configuration and exit without starting writers
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "SUBFORWARD_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to forwarder settings to validate
    #[arg(short, long, default_value = "subscriber.toml")]
    pub config: PathBuf,

    /// Path to the subscription catalog to validate
    #[arg(long, default_value = "catalog.toml")]
    pub catalog: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to the subscription catalog
    #[arg(long, default_value = "catalog.toml")]
    pub catalog: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every destination
    #[arg(long)]
    pub destinations: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
