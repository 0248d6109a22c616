//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{ContentTransform, ErrorPolicy};
use std::path::PathBuf;

/// Workpool - bounded-concurrency request dispatcher
#[derive(Parser, Debug)]
#[command(
    name = "workpool",
    author,
    version,
    about = "Bounded-concurrency request dispatcher",
    long_about = "Runs a fixed pool of workers draining one shared request queue.\n\n\
                  A sample producer submits requests in paced batches. Each worker \n\
                  turns a request into a response; on shutdown the pool drains."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "WORKPOOL_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sample producer against a worker pool
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "WORKPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "WORKPOOL_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Values that take precedence over the configuration file
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Number of concurrent workers
    #[arg(long, env = "WORKPOOL_POOL_WIDTH")]
    pub pool_width: Option<usize>,

    /// Queue capacity
    #[arg(long, env = "WORKPOOL_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Graceful shutdown budget in milliseconds
    #[arg(long, env = "WORKPOOL_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: Option<u64>,

    /// What happens to requests whose processing fails
    #[arg(long, value_enum)]
    pub error_policy: Option<ErrorPolicyArg>,

    /// Content transformation applied by the echo processor
    #[arg(long, value_enum)]
    pub transform: Option<TransformArg>,

    /// Maximum accepted payload size in bytes
    #[arg(long)]
    pub max_payload_bytes: Option<usize>,

    /// Number of requests the producer submits
    #[arg(long, env = "WORKPOOL_REQUESTS")]
    pub requests: Option<u64>,

    /// Pause after every N-th request
    #[arg(long)]
    pub batch_size: Option<u64>,

    /// Pause length in milliseconds
    #[arg(long)]
    pub batch_pause_ms: Option<u64>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "workpool.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Output as a TOML configuration file
    #[arg(long, conflicts_with = "json")]
    pub toml: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TransformArg {
    Identity,
    Uppercase,
    Reverse,
}

impl From<TransformArg> for ContentTransform {
    fn from(arg: TransformArg) -> Self {
        match arg {
            TransformArg::Identity => Self::Identity,
            TransformArg::Uppercase => Self::Uppercase,
            TransformArg::Reverse => Self::Reverse,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ErrorPolicyArg {
    /// Log the failure and keep going
    LogAndContinue,
    /// Also forward the failed request to the dead-letter log
    DeadLetter,
}

impl From<ErrorPolicyArg> for ErrorPolicy {
    fn from(arg: ErrorPolicyArg) -> Self {
        match arg {
            ErrorPolicyArg::LogAndContinue => Self::LogAndContinue,
            ErrorPolicyArg::DeadLetter => Self::DeadLetter,
        }
    }
}
