//! Clap derive structures for the `fhome` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so it may only use
//! clap and clap_complete.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fhome -- control F&Home devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "fhome",
    version,
    about = "Control F&Home home automation from the command line",
    long_about = "Talks to the F&Home cloud over its WebSocket protocol.\n\n\
        Credentials come from the config file or FHOME_EMAIL,\n\
        FHOME_CLOUD_PASSWORD and FHOME_RESOURCE_PASSWORD.",
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
    /// Account email (overrides config)
    #[arg(long, short = 'e', global = true)]
    pub email: Option<String>,

    /// Service endpoint (overrides config)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "FHOME_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,
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
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Inspect the home configuration
    #[command(alias = "c")]
    Config(ConfigArgs),

    /// Follow events pushed by the service
    #[command(alias = "e")]
    Event(EventArgs),

    /// Control devices
    #[command(alias = "o")]
    Object(ObjectArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// List configured objects (merged view by default)
    #[command(alias = "ls")]
    List(ConfigListArgs),
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct ConfigListArgs {
    /// Cells as set up in the configurator app
    #[arg(long)]
    pub system: bool,

    /// Cells as arranged in the client apps
    #[arg(long)]
    pub user: bool,

    /// Panels with their cells (system + user)
    #[arg(long)]
    pub merged: bool,

    /// Lighting levels at a glance
    #[arg(long)]
    pub glance: bool,
}

// ── Event ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventArgs {
    #[command(subcommand)]
    pub command: EventCommand,
}

#[derive(Debug, Subcommand)]
pub enum EventCommand {
    /// Print value changes until interrupted
    Watch {
        /// Print every frame, not only value changes
        #[arg(long)]
        all: bool,
    },
}

// ── Object ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ObjectArgs {
    #[command(subcommand)]
    pub command: ObjectCommand,
}

#[derive(Debug, Subcommand)]
pub enum ObjectCommand {
    /// Toggle an object on or off
    #[command(alias = "t")]
    Toggle {
        /// Cell id or (approximate) name
        object: String,
    },

    /// Set a dimmer to a level
    #[command(alias = "s")]
    Set {
        /// Cell id or (approximate) name
        object: String,

        /// Level in percent
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        value: u8,
    },

    /// Set a thermostat's target temperature
    Temp {
        /// Cell id or (approximate) name
        object: String,

        /// Target in °C (12-28, saturating)
        #[arg(allow_negative_numbers = true)]
        celsius: f64,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
