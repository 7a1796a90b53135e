//! Clap derive structures for the `wifista` CLI.
//!
//! Only clap and clap_complete may be used here; `build.rs` compiles this
//! file on its own to render man pages.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wifista -- drive and inspect a client-mode station state machine
#[derive(Debug, Parser)]
#[command(
    name = "wifista",
    version,
    about = "Simulate and inspect the wifista client-mode station",
    long_about = "Runs the client-mode connection state machine of a wireless station\n\
        against simulated radio, IP and network-agent collaborators.\n\n\
        Scenarios are YAML step lists; several are bundled with the binary.",
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
    /// Station interface whose configuration is used
    #[arg(long, short = 'i', env = "WIFISTA_INTERFACE", global = true)]
    pub interface: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WIFISTA_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
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

#[derive(Debug, Clone, ValueEnum)]
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
    /// Run a scenario against the simulated station
    #[command(alias = "sim", alias = "run")]
    Simulate(SimulateArgs),

    /// List the bundled scenarios
    #[command(alias = "ls")]
    Scenarios,

    /// Show the state hierarchy
    States(StatesArgs),

    /// Manage CLI configuration and saved networks
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SIMULATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "builtin"])))]
pub struct SimulateArgs {
    /// Scenario YAML file ("-" reads stdin)
    pub file: Option<PathBuf>,

    /// Run a bundled scenario instead of a file
    #[arg(long, short = 'b', value_name = "NAME")]
    pub builtin: Option<String>,

    /// Reachability-loss policy (overrides config and scenario)
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Start IP provisioning before association completes
    #[arg(long)]
    pub fast_connect: bool,

    /// Do not fall back to saved networks for ids the scenario omits
    #[arg(long)]
    pub no_saved: bool,

    /// Include every collaborator call in table output
    #[arg(long)]
    pub calls: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Drop the association
    Disconnect,
    /// Recreate the IP session and provision again
    Reprovision,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatesArgs {
    /// Mark a leaf state and its ancestors
    #[arg(long, short = 'a', value_enum)]
    pub active: Option<StateArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    #[value(name = "l2-connecting")]
    L2Connecting,
    #[value(name = "wait-before-l3-provisioning")]
    WaitBeforeL3Provisioning,
    #[value(name = "l3-provisioning")]
    L3Provisioning,
    #[value(name = "l3-connected")]
    L3Connected,
    Roaming,
    Disconnected,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Check the config file and every saved network
    Validate,

    /// Store a network passphrase in the system keyring
    SetPassphrase {
        /// Saved network name
        network: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
