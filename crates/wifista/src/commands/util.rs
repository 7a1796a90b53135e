//! Shared helpers for command handlers.

use std::io::Read;
use std::path::Path;

use wifista_core::{LeafState, ReachabilityPolicy};

use crate::cli::{PolicyArg, StateArg};
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Read a text file, or stdin when the path is `-`.
pub fn read_text(path: &Path) -> Result<String, CliError> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(path)?)
}

pub fn policy(arg: PolicyArg) -> ReachabilityPolicy {
    match arg {
        PolicyArg::Disconnect => ReachabilityPolicy::Disconnect,
        PolicyArg::Reprovision => ReachabilityPolicy::Reprovision,
    }
}

pub fn leaf_state(arg: StateArg) -> LeafState {
    match arg {
        StateArg::L2Connecting => LeafState::L2Connecting,
        StateArg::WaitBeforeL3Provisioning => LeafState::WaitBeforeL3Provisioning,
        StateArg::L3Provisioning => LeafState::L3Provisioning,
        StateArg::L3Connected => LeafState::L3Connected,
        StateArg::Roaming => LeafState::Roaming,
        StateArg::Disconnected => LeafState::Disconnected,
    }
}
