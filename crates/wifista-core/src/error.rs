// ── Core error types ──
//
// Errors surfaced to callers of the station runtime. Attempt failures
// are NOT errors: they are AttemptOutcomes reported to collaborators.
// A CoreError only means a command could not be accepted at all.

use thiserror::Error;

use crate::model::NetworkId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Command errors ───────────────────────────────────────────────
    #[error("Network {network_id} is not configured")]
    NetworkNotFound { network_id: NetworkId },

    #[error("Command {command} is not valid in state {state}")]
    InvalidState { command: String, state: String },

    #[error("Radio rejected the request: {message}")]
    Rejected { message: String },

    // ── Runtime errors ───────────────────────────────────────────────
    #[error("Station runtime has stopped")]
    StationStopped,

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Synchronous refusal from the radio abstraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("interface {interface} is not ready")]
    InterfaceDown { interface: String },

    #[error("driver refused command: {0}")]
    Refused(String),
}

impl From<RadioError> for CoreError {
    fn from(err: RadioError) -> Self {
        CoreError::Rejected {
            message: err.to_string(),
        }
    }
}
