// ── Collaborator contracts ──
//
// The state machine calls out to these services and never blocks on
// them. Anything asynchronous comes back as an event posted through the
// `EventSink`. Implementations live outside this crate (or in `sim`).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RadioError;
use crate::ip::{ProvisioningRequest, ProvisioningRun, SessionToken};
use crate::model::{
    AttemptReport, BlockReason, Bssid, ClientRole, DisableReason, LinkPropertiesSnapshot,
    MacAddress, NetworkId, NetworkIdentity, Ssid, WorkSource,
};

/// Identity of one network-agent registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentToken(pub u64);

impl fmt::Display for AgentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Result of a signal poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalPoll {
    pub rssi: i32,
    #[serde(default)]
    pub link_speed_mbps: Option<u32>,
    #[serde(default)]
    pub frequency_mhz: Option<u32>,
}

/// What the network agent advertises to the rest of the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub network_id: NetworkId,
    pub ssid: Ssid,
    pub bssid: Option<MacAddress>,
    pub role: ClientRole,
    pub rssi: Option<i32>,
}

// ── Radio ───────────────────────────────────────────────────────────

/// Supplicant and driver control.
pub trait RadioDriver: Send {
    /// Issue an association request. An `Err` means the request was
    /// never sent.
    fn connect(&mut self, identity: &NetworkIdentity, bssid: &Bssid) -> Result<(), RadioError>;

    /// Ask the supplicant to roam to a specific BSS of the current network.
    fn roam(&mut self, network_id: NetworkId, bssid: &Bssid) -> Result<(), RadioError>;

    fn disconnect(&mut self);

    fn reconnect(&mut self) -> Result<(), RadioError>;

    fn reassociate(&mut self) -> Result<(), RadioError>;

    fn poll_signal(&mut self) -> Option<SignalPoll>;

    fn set_power_save(&mut self, enabled: bool);

    fn set_suspend_optimizations(&mut self, enabled: bool);
}

// ── IP coordinator ──────────────────────────────────────────────────

/// Control surface of the IP-provisioning coordinator. Every call is
/// addressed to a session; results arrive as `IpEvent`s, and results of
/// a provisioning run must be tagged with the run they came from.
pub trait IpProvisioner: Send {
    fn create(&mut self, session: SessionToken);

    fn start_provisioning(
        &mut self,
        session: SessionToken,
        run: ProvisioningRun,
        request: &ProvisioningRequest,
    );

    /// Probe the first hop again after the BSS changed under us.
    fn confirm_reachability(&mut self, session: SessionToken, bssid: &MacAddress);

    fn complete_pre_dhcp_action(&mut self, session: SessionToken);

    fn stop(&mut self, session: SessionToken);

    fn shutdown(&mut self, session: SessionToken);
}

// ── Network presentation agent ──────────────────────────────────────

/// The connection as seen by the rest of the networking stack. At most
/// one agent is registered at a time.
pub trait NetworkPresenter: Send {
    fn register(&mut self, agent: AgentToken, info: &AgentInfo);

    fn update_info(&mut self, agent: AgentToken, info: &AgentInfo);

    fn update_link_properties(&mut self, agent: AgentToken, properties: &LinkPropertiesSnapshot);

    /// L3 is up; the agent may now be validated.
    fn mark_connected(&mut self, agent: AgentToken);

    fn unregister(&mut self, agent: AgentToken);
}

// ── Selection / scoring ─────────────────────────────────────────────

pub trait SelectionService: Send {
    /// Every attempt, success or failure, is reported here exactly once.
    fn attempt_ended(&mut self, report: &AttemptReport);

    /// An established connection failed after its attempt was reported.
    fn connection_lost(&mut self, report: &AttemptReport);

    fn signal_updated(&mut self, network_id: NetworkId, poll: &SignalPoll);

    fn validation_result(&mut self, network_id: NetworkId, valid: bool);

    /// The owner asked to reconnect; selection picks the candidate.
    fn reconnect_requested(&mut self, work_source: &WorkSource);
}

// ── Blocklist ───────────────────────────────────────────────────────

pub trait Blocklist: Send {
    /// Exclude a BSS from selection. `None` lets the blocklist pick its
    /// own backoff.
    fn block_bssid(
        &mut self,
        ssid: &Ssid,
        bssid: &MacAddress,
        reason: BlockReason,
        duration: Option<Duration>,
    );

    fn connection_succeeded(&mut self, ssid: &Ssid, bssid: &MacAddress);
}

// ── Network configuration ───────────────────────────────────────────

pub trait NetworkConfigStore: Send {
    fn identity(&self, network_id: NetworkId) -> Option<NetworkIdentity>;

    /// Count a failure against the network; the store decides when to
    /// disable it.
    fn record_failure(&mut self, network_id: NetworkId, reason: DisableReason);

    fn record_connected(&mut self, network_id: NetworkId);

    fn record_validation(&mut self, network_id: NetworkId, valid: bool);
}

/// Every collaborator the state machine talks to.
pub struct Collaborators {
    pub radio: Box<dyn RadioDriver>,
    pub ip: Box<dyn IpProvisioner>,
    pub presenter: Box<dyn NetworkPresenter>,
    pub selection: Box<dyn SelectionService>,
    pub blocklist: Box<dyn Blocklist>,
    pub networks: Box<dyn NetworkConfigStore>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
