// ── Event queue types ──
//
// Every input to the state machine is an `Event`. Collaborators never
// touch the machine directly: they post events through an `EventSink`
// and the single consumer processes them one at a time, to completion.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::error::CoreError;
use crate::ip::{ProvisioningRun, SessionToken};
use crate::model::{
    AuthFailureReason, Bssid, LinkPropertiesSnapshot, MacAddress, NetworkId, Ssid,
    SupplicantState,
};
use crate::service::AgentToken;

/// One unit of work for the state machine.
#[derive(Debug)]
pub enum Event {
    Command(CommandEnvelope),
    Radio(RadioEvent),
    Ip(IpEvent),
    Agent(AgentEvent),
    Timer(TimerEvent),
    /// Tear down and stop; posted by the runtime, never by collaborators.
    Shutdown,
}

impl Event {
    pub fn command(command: Command) -> Self {
        Self::Command(CommandEnvelope::detached(command))
    }

    /// Kebab-case name of the event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Command(envelope) => envelope.command.name(),
            Self::Radio(ev) => ev.name(),
            Self::Ip(ev) => ev.kind.name(),
            Self::Agent(ev) => match ev.kind {
                AgentEventKind::Validation { .. } => "agent-validation",
                AgentEventKind::Unwanted => "agent-unwanted",
            },
            Self::Timer(ev) => ev.kind.name(),
            Self::Shutdown => "shutdown",
        }
    }
}

// ── Radio / driver events ───────────────────────────────────────────

/// Notifications from the radio abstraction (supplicant + driver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RadioEvent {
    SupplicantStateChanged {
        #[serde(default)]
        network_id: Option<NetworkId>,
        #[serde(default)]
        ssid: Option<Ssid>,
        #[serde(default)]
        bssid: Option<MacAddress>,
        #[serde(default)]
        frequency_mhz: Option<u32>,
        state: SupplicantState,
    },
    AssociationRejected {
        ssid: Ssid,
        #[serde(default)]
        bssid: Option<MacAddress>,
        status_code: u16,
        #[serde(default)]
        timed_out: bool,
    },
    AuthenticationFailure {
        ssid: Ssid,
        #[serde(default)]
        bssid: Option<MacAddress>,
        reason: AuthFailureReason,
    },
    NetworkConnected {
        network_id: NetworkId,
        ssid: Ssid,
        bssid: MacAddress,
    },
    NetworkDisconnected {
        #[serde(default)]
        ssid: Option<Ssid>,
        #[serde(default)]
        bssid: Option<MacAddress>,
        #[serde(default)]
        reason_code: u16,
        #[serde(default)]
        locally_generated: bool,
    },
    TargetBssidChanged {
        bssid: Bssid,
    },
    NetworkNotFound {
        ssid: Ssid,
    },
}

impl RadioEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SupplicantStateChanged { .. } => "supplicant-state-changed",
            Self::AssociationRejected { .. } => "association-rejected",
            Self::AuthenticationFailure { .. } => "authentication-failure",
            Self::NetworkConnected { .. } => "network-connected",
            Self::NetworkDisconnected { .. } => "network-disconnected",
            Self::TargetBssidChanged { .. } => "target-bssid-changed",
            Self::NetworkNotFound { .. } => "network-not-found",
        }
    }
}

// ── IP-coordinator events ───────────────────────────────────────────

/// Why the coordinator believes the first hop is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReachabilityLossReason {
    /// Neighbour probing failed during normal operation.
    #[default]
    Organic,
    /// A reachability confirmation we requested failed.
    Confirm,
    /// Probing failed right after an L2 roam.
    Roam,
}

/// A callback from one IP-coordinator session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpEvent {
    /// Session the callback came from; stale sessions are discarded.
    pub session: SessionToken,
    /// Provisioning run a result belongs to; `None` for session-level
    /// callbacks.
    pub run: Option<ProvisioningRun>,
    pub kind: IpEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpEventKind {
    Created,
    ProvisioningSuccess(LinkPropertiesSnapshot),
    ProvisioningFailure,
    LinkPropertiesChanged(LinkPropertiesSnapshot),
    ReachabilityLost {
        #[serde(default)]
        reason: ReachabilityLossReason,
    },
    PreDhcpAction,
    PostDhcpAction,
    ShutdownComplete,
}

impl IpEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "ip-created",
            Self::ProvisioningSuccess(_) => "ip-provisioning-success",
            Self::ProvisioningFailure => "ip-provisioning-failure",
            Self::LinkPropertiesChanged(_) => "ip-link-properties-changed",
            Self::ReachabilityLost { .. } => "ip-reachability-lost",
            Self::PreDhcpAction => "ip-pre-dhcp-action",
            Self::PostDhcpAction => "ip-post-dhcp-action",
            Self::ShutdownComplete => "ip-shutdown-complete",
        }
    }

    /// Results that belong to one provisioning run rather than to the
    /// session as a whole.
    pub fn is_run_scoped(&self) -> bool {
        matches!(
            self,
            Self::ProvisioningSuccess(_)
                | Self::ProvisioningFailure
                | Self::ReachabilityLost { .. }
                | Self::PreDhcpAction
                | Self::PostDhcpAction
        )
    }
}

// ── Network-agent events ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEvent {
    pub agent: AgentToken,
    pub kind: AgentEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentEventKind {
    Validation { valid: bool },
    Unwanted,
}

// ── Timer events ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TimerKind {
    ConnectingWatchdog,
    RoamWatchdog,
    IpClientStartup,
    IpClientShutdown,
    RssiPoll,
}

impl TimerKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::ConnectingWatchdog => "connecting-watchdog",
            Self::RoamWatchdog => "roam-watchdog",
            Self::IpClientStartup => "ip-client-startup",
            Self::IpClientShutdown => "ip-client-shutdown",
            Self::RssiPoll => "rssi-poll",
        }
    }
}

/// A fired timer, tagged with the generation it was armed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerEvent {
    pub kind: TimerKind,
    pub generation: u64,
}

// ── EventSink ───────────────────────────────────────────────────────

/// Cloneable handle for posting events into the station's queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Post any event. Fails only once the station has stopped.
    pub fn post(&self, event: Event) -> Result<(), CoreError> {
        self.tx.send(event).map_err(|_| CoreError::StationStopped)
    }

    pub fn radio(&self, event: RadioEvent) -> Result<(), CoreError> {
        self.post(Event::Radio(event))
    }

    /// Post a session-level callback such as `Created`.
    pub fn ip(&self, session: SessionToken, kind: IpEventKind) -> Result<(), CoreError> {
        self.post(Event::Ip(IpEvent {
            session,
            run: None,
            kind,
        }))
    }

    /// Post a result from one provisioning run.
    pub fn provisioning(
        &self,
        session: SessionToken,
        run: ProvisioningRun,
        kind: IpEventKind,
    ) -> Result<(), CoreError> {
        self.post(Event::Ip(IpEvent {
            session,
            run: Some(run),
            kind,
        }))
    }

    pub fn agent(&self, agent: AgentToken, kind: AgentEventKind) -> Result<(), CoreError> {
        self.post(Event::Agent(AgentEvent { agent, kind }))
    }

    pub(crate) fn timer(&self, event: TimerEvent) -> Result<(), CoreError> {
        self.post(Event::Timer(event))
    }

    /// Queue a command and return the receiver for its result.
    pub fn command(
        &self,
        command: Command,
    ) -> Result<oneshot::Receiver<Result<CommandResult, CoreError>>, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.post(Event::Command(CommandEnvelope {
            command,
            response_tx: Some(tx),
        }))?;
        Ok(rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
