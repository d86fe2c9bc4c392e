//! Clap derive structures for the `viamhub` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// viamhub -- keep an eye on a Viam robot from the command line
#[derive(Debug, Parser)]
#[command(
    name = "viamhub",
    version,
    about = "Monitor and drive Viam robots from the command line",
    long_about = "Connects to a Viam robot, discovers its motors and sensors,\n\
        reads sensor values (directly or through the cloud data API)\n\
        and drives motors as timed covers such as garage doors.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Robot profile to use
    #[arg(long, short = 'p', env = "VIAMHUB_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file location
    #[arg(long, env = "VIAMHUB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Robot address (overrides profile)
    #[arg(long, short = 'a', env = "VIAMHUB_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Robot API key identifier
    #[arg(long, env = "VIAMHUB_API_KEY_ID", global = true)]
    pub api_key_id: Option<String>,

    /// Robot API key
    #[arg(long, env = "VIAMHUB_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VIAMHUB_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VIAMHUB_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "VIAMHUB_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and show the connection state
    #[command(alias = "st")]
    Status,

    /// List discovered motors, sensors and other resources
    #[command(alias = "res")]
    Resources,

    /// Read every sensor once
    #[command(alias = "r")]
    Readings(ReadingsArgs),

    /// Poll sensors continuously until interrupted
    Watch(WatchArgs),

    /// Drive a motor
    #[command(alias = "m")]
    Motor(MotorArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Readings ─────────────────────────────────────────────────────────

/// Where sensor values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Cloud data API when the profile enables it, otherwise the robot
    Auto,
    /// Read sensors on the robot directly
    Device,
    /// Latest values stored by the cloud data API
    Cloud,
}

#[derive(Debug, Args)]
pub struct ReadingsArgs {
    /// Only show these sensors (repeatable)
    #[arg(long, short = 's')]
    pub sensor: Vec<String>,

    /// Reading source
    #[arg(long, value_enum, default_value = "auto")]
    pub source: SourceKind,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between refreshes (defaults to the profile's poll_interval)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Only show these sensors (repeatable)
    #[arg(long, short = 's')]
    pub sensor: Vec<String>,

    /// Reading source
    #[arg(long, value_enum, default_value = "auto")]
    pub source: SourceKind,
}

// ── Motor ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MotorArgs {
    #[command(subcommand)]
    pub command: MotorCommand,
}

#[derive(Debug, Subcommand)]
pub enum MotorCommand {
    /// Run the motor in the opening direction for the configured open time
    Open {
        /// Motor name
        name: String,
    },

    /// Run the motor in the closing direction for the configured close time
    Close {
        /// Motor name
        name: String,
    },

    /// Stop the motor
    Stop {
        /// Motor name
        name: String,
    },

    /// Set raw power, -1.0 (full reverse) to 1.0 (full forward)
    Power {
        /// Motor name
        name: String,
        #[arg(allow_negative_numbers = true)]
        power: f64,
    },

    /// Spin for a number of revolutions at the given RPM
    GoFor {
        /// Motor name
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        rpm: f64,
        #[arg(long)]
        revolutions: f64,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the effective configuration (secrets redacted)
    Show,

    /// Print the config file location
    Path,

    /// List profiles (* marks the default)
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store a profile's API key in the system keyring
    SetKey {
        /// Profile name (defaults to the active profile)
        name: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
