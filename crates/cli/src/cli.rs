//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Courier - polling message dispatch pipeline
#[derive(Parser, Debug)]
#[command(
    name = "courier",
    author,
    version,
    about = "Polling message dispatch pipeline",
    long_about = "Reads messages line by line from stdin or a file into a bounded queue channel,\n\
                  polls the channel on a fixed schedule and dispatches each message to the\n\
                  configured handlers (byte streams, JSON mappers, socket writers, logs)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "COURIER_VERBOSE")]
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
        env = "COURIER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispatch pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "COURIER_CONFIG"
    )]
    pub config: PathBuf,

    /// Read messages from this file instead of stdin
    #[arg(short, long, env = "COURIER_INPUT")]
    pub input: Option<PathBuf>,

    /// Stop reading input after this many messages (0 = unlimited)
    #[arg(long, default_value = "0", env = "COURIER_LIMIT")]
    pub limit: u64,

    /// Override channel capacity from configuration (0 = unbounded)
    #[arg(long, env = "COURIER_CAPACITY")]
    pub capacity: Option<usize>,

    /// Override max messages per poll from configuration (<= 0 = unbounded)
    #[arg(long, allow_hyphen_values = true, env = "COURIER_MAX_MESSAGES_PER_POLL")]
    pub max_messages_per_poll: Option<i64>,

    /// Override poll interval in milliseconds from configuration
    #[arg(long, env = "COURIER_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "COURIER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show handler parameters
    #[arg(long)]
    pub handlers: bool,
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
