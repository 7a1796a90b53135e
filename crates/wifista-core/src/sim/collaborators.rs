// ── Simulated collaborators ──
//
// Each one records its calls into the shared `Journal` and otherwise
// does nothing: asynchronous results are injected by the harness as
// events, exactly as a real collaborator would post them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use super::{Call, Journal};
use crate::error::RadioError;
use crate::ip::{ProvisioningRequest, ProvisioningRun, SessionToken};
use crate::model::{
    AttemptReport, BlockReason, Bssid, Credential, DisableReason, IpAssignment,
    LinkPropertiesSnapshot, MacAddress, NetworkId, NetworkIdentity, SecurityType, Ssid,
    WorkSource,
};
use crate::service::{
    AgentInfo, AgentToken, Blocklist, IpProvisioner, NetworkConfigStore, NetworkPresenter,
    RadioDriver, SelectionService, SignalPoll,
};

// ── Radio ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RadioControls {
    refuse_next: Option<String>,
    signal: Option<SignalPoll>,
}

/// Radio whose refusals and signal readings are set by the harness.
/// Clones share the same controls.
#[derive(Debug, Clone)]
pub struct SimRadio {
    journal: Journal,
    controls: Arc<Mutex<RadioControls>>,
}

impl SimRadio {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            controls: Arc::default(),
        }
    }

    /// Make the next connect or roam request fail synchronously.
    pub fn refuse_next(&self, message: impl Into<String>) {
        self.controls().refuse_next = Some(message.into());
    }

    /// Reading returned by every following signal poll.
    pub fn set_signal(&self, poll: SignalPoll) {
        self.controls().signal = Some(poll);
    }

    fn controls(&self) -> std::sync::MutexGuard<'_, RadioControls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_refusal(&self) -> Result<(), RadioError> {
        match self.controls().refuse_next.take() {
            Some(message) => Err(RadioError::Refused(message)),
            None => Ok(()),
        }
    }
}

impl RadioDriver for SimRadio {
    fn connect(&mut self, identity: &NetworkIdentity, bssid: &Bssid) -> Result<(), RadioError> {
        self.journal.record(Call::RadioConnect {
            network_id: identity.network_id,
            bssid: bssid.clone(),
        });
        self.take_refusal()
    }

    fn roam(&mut self, network_id: NetworkId, bssid: &Bssid) -> Result<(), RadioError> {
        self.journal.record(Call::RadioRoam {
            network_id,
            bssid: bssid.clone(),
        });
        self.take_refusal()
    }

    fn disconnect(&mut self) {
        self.journal.record(Call::RadioDisconnect);
    }

    fn reconnect(&mut self) -> Result<(), RadioError> {
        self.journal.record(Call::RadioReconnect);
        self.take_refusal()
    }

    fn reassociate(&mut self) -> Result<(), RadioError> {
        self.journal.record(Call::RadioReassociate);
        self.take_refusal()
    }

    fn poll_signal(&mut self) -> Option<SignalPoll> {
        self.controls().signal
    }

    fn set_power_save(&mut self, enabled: bool) {
        self.journal.record(Call::PowerSave { enabled });
    }

    fn set_suspend_optimizations(&mut self, enabled: bool) {
        self.journal.record(Call::SuspendOptimizations { enabled });
    }
}

// ── IP coordinator ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimIpProvisioner {
    journal: Journal,
}

impl SimIpProvisioner {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl IpProvisioner for SimIpProvisioner {
    fn create(&mut self, session: SessionToken) {
        self.journal.record(Call::IpCreate { session });
    }

    fn start_provisioning(
        &mut self,
        session: SessionToken,
        run: ProvisioningRun,
        request: &ProvisioningRequest,
    ) {
        self.journal.record(Call::IpStartProvisioning {
            session,
            run,
            mode: request.mode.name().to_owned(),
        });
    }

    fn confirm_reachability(&mut self, session: SessionToken, bssid: &MacAddress) {
        self.journal.record(Call::IpConfirmReachability {
            session,
            bssid: bssid.clone(),
        });
    }

    fn complete_pre_dhcp_action(&mut self, session: SessionToken) {
        self.journal.record(Call::IpPreDhcpComplete { session });
    }

    fn stop(&mut self, session: SessionToken) {
        self.journal.record(Call::IpStop { session });
    }

    fn shutdown(&mut self, session: SessionToken) {
        self.journal.record(Call::IpShutdown { session });
    }
}

// ── Presenter / selection / blocklist ────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimPresenter {
    journal: Journal,
}

impl SimPresenter {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl NetworkPresenter for SimPresenter {
    fn register(&mut self, agent: AgentToken, info: &AgentInfo) {
        self.journal.record(Call::AgentRegister {
            agent,
            network_id: info.network_id,
        });
    }

    fn update_info(&mut self, agent: AgentToken, _info: &AgentInfo) {
        self.journal.record(Call::AgentUpdateInfo { agent });
    }

    fn update_link_properties(&mut self, agent: AgentToken, properties: &LinkPropertiesSnapshot) {
        self.journal.record(Call::AgentLinkProperties {
            agent,
            addresses: properties.addresses.len(),
        });
    }

    fn mark_connected(&mut self, agent: AgentToken) {
        self.journal.record(Call::AgentConnected { agent });
    }

    fn unregister(&mut self, agent: AgentToken) {
        self.journal.record(Call::AgentUnregister { agent });
    }
}

#[derive(Debug, Clone)]
pub struct SimSelection {
    journal: Journal,
}

impl SimSelection {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl SelectionService for SimSelection {
    fn attempt_ended(&mut self, report: &AttemptReport) {
        self.journal.record(Call::AttemptEnded {
            attempt_id: report.attempt_id,
            kind: report.kind,
            network_id: report.network_id,
            outcome: report.outcome,
            bssid: report.bssid.clone(),
        });
    }

    fn connection_lost(&mut self, report: &AttemptReport) {
        self.journal.record(Call::ConnectionLost {
            network_id: report.network_id,
            outcome: report.outcome,
        });
    }

    fn signal_updated(&mut self, network_id: NetworkId, poll: &SignalPoll) {
        self.journal.record(Call::SignalUpdated {
            network_id,
            rssi: poll.rssi,
        });
    }

    fn validation_result(&mut self, network_id: NetworkId, valid: bool) {
        self.journal
            .record(Call::ValidationResult { network_id, valid });
    }

    fn reconnect_requested(&mut self, work_source: &WorkSource) {
        self.journal.record(Call::ReconnectRequested {
            requesters: work_source.0.len(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct SimBlocklist {
    journal: Journal,
}

impl SimBlocklist {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Blocklist for SimBlocklist {
    fn block_bssid(
        &mut self,
        ssid: &Ssid,
        bssid: &MacAddress,
        reason: BlockReason,
        duration: Option<Duration>,
    ) {
        self.journal.record(Call::BlockBssid {
            ssid: ssid.clone(),
            bssid: bssid.clone(),
            reason,
            secs: duration.map(|d| d.as_secs()),
        });
    }

    fn connection_succeeded(&mut self, ssid: &Ssid, bssid: &MacAddress) {
        self.journal.record(Call::ConnectionSucceeded {
            ssid: ssid.clone(),
            bssid: bssid.clone(),
        });
    }
}

// ── Network configuration ────────────────────────────────────────────

/// A saved network as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimNetwork {
    pub id: NetworkId,
    pub ssid: Ssid,
    #[serde(default)]
    pub security: SecurityType,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub ip: IpAssignment,
    #[serde(default)]
    pub hidden: bool,
}

impl SimNetwork {
    pub fn open(id: u32, ssid: &str) -> Self {
        Self {
            id: NetworkId(id),
            ssid: Ssid::new(ssid),
            security: SecurityType::Open,
            passphrase: None,
            ip: IpAssignment::Dynamic,
            hidden: false,
        }
    }

    pub fn identity(&self) -> NetworkIdentity {
        let credential = match &self.passphrase {
            Some(passphrase) => Credential::Passphrase(SecretString::from(passphrase.clone())),
            None => Credential::None,
        };
        NetworkIdentity {
            network_id: self.id,
            ssid: self.ssid.clone(),
            security: self.security,
            credential,
            ip_assignment: self.ip.clone(),
            hidden: self.hidden,
        }
    }
}

/// Saved networks held in memory, optionally backed by another store
/// for networks the scenario does not define.
pub struct SimNetworkStore {
    journal: Journal,
    networks: BTreeMap<NetworkId, SimNetwork>,
    fallback: Option<Box<dyn NetworkConfigStore>>,
}

impl std::fmt::Debug for SimNetworkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNetworkStore")
            .field("networks", &self.networks.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl SimNetworkStore {
    pub fn new(journal: Journal, networks: impl IntoIterator<Item = SimNetwork>) -> Self {
        Self {
            journal,
            networks: networks
                .into_iter()
                .map(|network| (network.id, network))
                .collect(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, store: Box<dyn NetworkConfigStore>) -> Self {
        self.fallback = Some(store);
        self
    }
}

impl NetworkConfigStore for SimNetworkStore {
    fn identity(&self, network_id: NetworkId) -> Option<NetworkIdentity> {
        self.networks
            .get(&network_id)
            .map(SimNetwork::identity)
            .or_else(|| self.fallback.as_ref()?.identity(network_id))
    }

    fn record_failure(&mut self, network_id: NetworkId, reason: DisableReason) {
        self.journal
            .record(Call::RecordFailure { network_id, reason });
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.record_failure(network_id, reason);
        }
    }

    fn record_connected(&mut self, network_id: NetworkId) {
        self.journal.record(Call::RecordConnected { network_id });
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.record_connected(network_id);
        }
    }

    fn record_validation(&mut self, network_id: NetworkId, valid: bool) {
        self.journal
            .record(Call::RecordValidation { network_id, valid });
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.record_validation(network_id, valid);
        }
    }
}
