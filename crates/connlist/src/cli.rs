//! Clap derive structures for the `connlist` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use connlist_core::ServiceFilter;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// connlist -- ordered projections of connection-manager service lists
#[derive(Debug, Parser)]
#[command(
    name = "connlist",
    version,
    about = "Replay network service snapshots through sorted, diffed projections",
    long_about = "Feeds recorded connection-manager snapshots through an ordered\n\
        projection and prints the insert / move / remove / touch edits\n\
        each refresh produces.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "CONNLIST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to `defaults.output` from the config file)
    #[arg(long, short = 'o', env = "CONNLIST_OUTPUT", global = true)]
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
    /// Plain text, one line per edit (scripting)
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
    /// Replay a recorded snapshot file through a projection
    #[command(alias = "r")]
    Replay(ReplayArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Replay ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Snapshot file (JSON, or YAML with a .yaml/.yml extension)
    pub file: PathBuf,

    /// Named projection from the config file
    #[arg(long, short = 'p', env = "CONNLIST_PROFILE")]
    pub profile: Option<String>,

    /// Technology to project; "all" for every technology
    #[arg(long, short = 't')]
    pub technology: Option<String>,

    /// Which services to keep: all, saved_only, available_only
    #[arg(long, short = 'f')]
    pub filter: Option<ServiceFilter>,

    /// Sort by availability, signal strength and name
    #[arg(long)]
    pub sort: bool,

    /// Put managed services first (implies --sort)
    #[arg(long)]
    pub group: bool,

    /// Print only the final ordered list
    #[arg(long)]
    pub final_only: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured projections
    Projections,

    /// Set the default projection
    Use {
        /// Projection name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
