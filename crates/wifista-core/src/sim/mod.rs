// ── Deterministic simulation ──
//
// In-memory collaborators, a manually advanced clock and a scenario
// runner. Everything the machine does lands in a shared `Journal` so a
// run can be inspected or snapshotted after the fact.

mod collaborators;
mod scenario;
mod timers;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::ip::{ProvisioningRun, SessionToken};
use crate::model::{
    AttemptKind, AttemptOutcome, BlockReason, Bssid, DisableReason, MacAddress, NetworkId, Ssid,
};
use crate::service::AgentToken;

pub use collaborators::{
    SimBlocklist, SimIpProvisioner, SimNetwork, SimNetworkStore, SimPresenter, SimRadio,
    SimSelection,
};
pub use scenario::{
    Harness, Scenario, ScenarioError, Step, Trace, TraceCommand, TraceTransition, run_scenario,
    run_scenario_with_fallback,
};
pub use timers::ManualTimers;

/// One collaborator call made by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "kebab-case")]
pub enum Call {
    // ── Radio ──
    RadioConnect {
        network_id: NetworkId,
        bssid: Bssid,
    },
    RadioRoam {
        network_id: NetworkId,
        bssid: Bssid,
    },
    RadioDisconnect,
    RadioReconnect,
    RadioReassociate,
    PowerSave {
        enabled: bool,
    },
    SuspendOptimizations {
        enabled: bool,
    },

    // ── IP coordinator ──
    IpCreate {
        session: SessionToken,
    },
    IpStartProvisioning {
        session: SessionToken,
        run: ProvisioningRun,
        mode: String,
    },
    IpConfirmReachability {
        session: SessionToken,
        bssid: MacAddress,
    },
    IpPreDhcpComplete {
        session: SessionToken,
    },
    IpStop {
        session: SessionToken,
    },
    IpShutdown {
        session: SessionToken,
    },

    // ── Network agent ──
    AgentRegister {
        agent: AgentToken,
        network_id: NetworkId,
    },
    AgentUpdateInfo {
        agent: AgentToken,
    },
    AgentLinkProperties {
        agent: AgentToken,
        addresses: usize,
    },
    AgentConnected {
        agent: AgentToken,
    },
    AgentUnregister {
        agent: AgentToken,
    },

    // ── Selection / blocklist / config ──
    AttemptEnded {
        attempt_id: u64,
        kind: AttemptKind,
        network_id: NetworkId,
        outcome: AttemptOutcome,
        bssid: Option<MacAddress>,
    },
    ConnectionLost {
        network_id: NetworkId,
        outcome: AttemptOutcome,
    },
    SignalUpdated {
        network_id: NetworkId,
        rssi: i32,
    },
    ValidationResult {
        network_id: NetworkId,
        valid: bool,
    },
    ReconnectRequested {
        requesters: usize,
    },
    BlockBssid {
        ssid: Ssid,
        bssid: MacAddress,
        reason: BlockReason,
        secs: Option<u64>,
    },
    ConnectionSucceeded {
        ssid: Ssid,
        bssid: MacAddress,
    },
    RecordFailure {
        network_id: NetworkId,
        reason: DisableReason,
    },
    RecordConnected {
        network_id: NetworkId,
    },
    RecordValidation {
        network_id: NetworkId,
        valid: bool,
    },
}

/// Append-only record shared by every simulated collaborator.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Copy of every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls recorded at or after `index`.
    pub fn since(&self, index: usize) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .skip(index)
            .cloned()
            .collect()
    }

    /// Outcomes of every reported attempt, oldest first.
    pub fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AttemptEnded { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}
