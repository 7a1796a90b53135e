//! CLI error types with miette diagnostics.
//!
//! Maps core, scenario and config errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use wifista_config::ConfigError;
use wifista_core::CoreError;
use wifista_core::sim::ScenarioError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const TIMEOUT: i32 = 8;
    pub const EXPECTATION: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Scenarios ────────────────────────────────────────────────────
    #[error("Scenario '{name}' not found")]
    #[diagnostic(
        code(wifista::scenario_not_found),
        help("Run: wifista scenarios to see the bundled scenarios")
    )]
    ScenarioNotFound { name: String },

    #[error("Invalid scenario: {message}")]
    #[diagnostic(
        code(wifista::scenario_parse),
        help("Scenario keys are snake_case; step and event names are kebab-case.")
    )]
    ScenarioParse { message: String },

    #[error("Scenario '{scenario}' failed at {message}")]
    #[diagnostic(code(wifista::expectation_failed))]
    ExpectationFailed { scenario: String, message: String },

    // ── Station ──────────────────────────────────────────────────────
    #[error("Network {identifier} not found")]
    #[diagnostic(
        code(wifista::not_found),
        help("Define it under `networks:` in the scenario or save it in the config file.")
    )]
    NetworkNotFound { identifier: String },

    #[error("{message}")]
    #[diagnostic(code(wifista::invalid_state))]
    InvalidState { message: String },

    #[error("Station error: {message}")]
    #[diagnostic(code(wifista::station))]
    Station { message: String },

    #[error("Timed out after {seconds}s")]
    #[diagnostic(code(wifista::timeout))]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wifista::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No credentials configured for network '{network}'")]
    #[diagnostic(
        code(wifista::no_credentials),
        help(
            "Store one with: wifista config set-passphrase {network}\n\
             Or set passphrase_env in the network's config section."
        )
    )]
    NoCredentials { network: String },

    #[error("Saved network '{name}' not found in configuration")]
    #[diagnostic(
        code(wifista::saved_network_not_found),
        help("Available networks: {available}")
    )]
    SavedNetworkNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(wifista::config_exists),
        help("Use --yes (-y) to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(wifista::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(wifista::serialize))]
    Serialize(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ScenarioNotFound { .. }
            | Self::NetworkNotFound { .. }
            | Self::SavedNetworkNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } | Self::InvalidState { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ScenarioParse { .. } => exit_code::USAGE,
            Self::ExpectationFailed { .. } => exit_code::EXPECTATION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NetworkNotFound { network_id } => CliError::NetworkNotFound {
                identifier: network_id.to_string(),
            },
            CoreError::InvalidState { .. } => CliError::InvalidState {
                message: err.to_string(),
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Rejected { .. } | CoreError::StationStopped | CoreError::Internal(_) => {
                CliError::Station {
                    message: err.to_string(),
                }
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { network } => CliError::NoCredentials { network },
            ConfigError::Serialization(e) => CliError::Serialize(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

// ── ScenarioError → CliError mapping ─────────────────────────────────

/// Attach the scenario name, which `ScenarioError` does not carry.
pub fn scenario_error(scenario: &str, err: ScenarioError) -> CliError {
    match err {
        ScenarioError::Parse(e) => CliError::ScenarioParse {
            message: e.to_string(),
        },
        ScenarioError::Unknown { name } => CliError::ScenarioNotFound { name },
        ScenarioError::Core(e) => e.into(),
        e @ (ScenarioError::NoSession { .. }
        | ScenarioError::NoAgent { .. }
        | ScenarioError::Expectation { .. }) => CliError::ExpectationFailed {
            scenario: scenario.into(),
            message: e.to_string(),
        },
    }
}
