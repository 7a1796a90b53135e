// ── Command API ──
//
// Everything a caller can ask of the station flows through the `Command`
// enum. Commands are queued behind radio, IP and timer events and are
// processed strictly in FIFO order; a superseding `StartConnect` only
// wins logically, by retiring the in-flight attempt when it is reached.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::CoreError;
use crate::model::{Bssid, ClientRole, NetworkId, Requester, WorkSource};

/// Why a caller asked to drop the connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DisconnectReason {
    #[default]
    User,
    /// Network selection picked something better.
    NetworkSelection,
    /// The connectivity stack no longer wants this network.
    Unwanted,
    /// The interface is being torn down.
    Shutdown,
}

/// All requests the state machine accepts from its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    StartConnect {
        network_id: NetworkId,
        #[serde(default)]
        requester: Requester,
        #[serde(default)]
        bssid: Bssid,
    },
    StartRoam {
        network_id: NetworkId,
        bssid: Bssid,
    },
    Disconnect {
        #[serde(default)]
        reason: DisconnectReason,
    },
    Reconnect {
        #[serde(default)]
        work_source: WorkSource,
    },
    Reassociate,
    RssiPollEnable {
        enabled: bool,
    },
    ScreenStateChanged {
        screen_on: bool,
    },
    RoleChanged {
        role: ClientRole,
    },
}

impl Command {
    /// Short kebab-case name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartConnect { .. } => "start-connect",
            Self::StartRoam { .. } => "start-roam",
            Self::Disconnect { .. } => "disconnect",
            Self::Reconnect { .. } => "reconnect",
            Self::Reassociate => "reassociate",
            Self::RssiPollEnable { .. } => "rssi-poll-enable",
            Self::ScreenStateChanged { .. } => "screen-state-changed",
            Self::RoleChanged { .. } => "role-changed",
        }
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// A connect or roam attempt is now in flight.
    AttemptStarted { attempt_id: u64 },
    /// The command was valid but had nothing to do in the current state.
    Ignored,
}

/// A command envelope carried through the event queue.
/// Contains the command and an optional oneshot response channel.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub response_tx: Option<oneshot::Sender<Result<CommandResult, CoreError>>>,
}

impl CommandEnvelope {
    /// An envelope whose result nobody waits for.
    pub fn detached(command: Command) -> Self {
        Self {
            command,
            response_tx: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn start_connect_deserializes_with_defaults() {
        let cmd: Command = serde_json::from_str(r#"{"start-connect":{"network_id":5}}"#).unwrap();
        assert_eq!(
            cmd,
            Command::StartConnect {
                network_id: NetworkId(5),
                requester: Requester::system(),
                bssid: Bssid::Any,
            }
        );
    }

    #[test]
    fn unit_variant_is_a_plain_string() {
        let cmd: Command = serde_json::from_str(r#""reassociate""#).unwrap();
        assert_eq!(cmd, Command::Reassociate);
        assert_eq!(cmd.name(), "reassociate");
    }
}
