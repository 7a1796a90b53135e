// ── Connection context ──
//
// The mutable record of what the station is trying to do and what it
// is connected to. Owned exclusively by the state machine and mutated
// only while an event is being processed; everyone else reads it
// through the accessors below.

use chrono::{DateTime, Utc};

use crate::config::ClientModeConfig;
use crate::event::TimerKind;
use crate::model::{
    AttemptKind, AttemptOutcome, AttemptReport, Bssid, ClientRole, LinkPropertiesSnapshot,
    MacAddress, NetworkId, NetworkIdentity, Requester, Ssid, SupplicantState,
};
use crate::service::AgentToken;
use crate::watchdog::Watchdog;

/// One logical connection try, from command to terminal outcome.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: u64,
    pub kind: AttemptKind,
    pub network_id: NetworkId,
    pub ssid: Ssid,
    pub target_bssid: Bssid,
    pub requester: Requester,
    pub user_selected: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConnectionContext {
    // ── Target / current identity ──
    pub(crate) target_network_id: Option<NetworkId>,
    pub(crate) target_bssid: Bssid,
    pub(crate) last_network_id: Option<NetworkId>,
    pub(crate) last_bssid: Option<MacAddress>,
    pub(crate) is_auto_roaming: bool,
    pub(crate) is_user_selected: bool,
    pub(crate) identity: Option<NetworkIdentity>,

    // ── Attempt bookkeeping ──
    pub(crate) attempt: Option<Attempt>,
    /// The attempt that brought the current connection up.
    pub(crate) established: Option<Attempt>,
    pub(crate) connecting_watchdog: Watchdog,
    pub(crate) roam_watchdog: Watchdog,
    pub(crate) not_found_count: u32,
    /// Set once the radio reports association to the roam target.
    pub(crate) roam_associated: bool,
    next_attempt_id: u64,

    // ── Link bookkeeping ──
    pub(crate) connected: bool,
    pub(crate) supplicant_state: SupplicantState,
    pub(crate) rssi: Option<i32>,
    pub(crate) link_speed_mbps: Option<u32>,
    pub(crate) frequency_mhz: Option<u32>,
    pub(crate) link_properties: LinkPropertiesSnapshot,
    pub(crate) agent: Option<AgentToken>,
    next_agent_id: u64,

    // ── Device / role ──
    pub(crate) role: ClientRole,
    pub(crate) screen_on: bool,
    pub(crate) rssi_poll_enabled: bool,
    pub(crate) rssi_poll: Watchdog,
}

impl ConnectionContext {
    pub fn new(config: &ClientModeConfig) -> Self {
        Self {
            target_network_id: None,
            target_bssid: Bssid::Any,
            last_network_id: None,
            last_bssid: None,
            is_auto_roaming: false,
            is_user_selected: false,
            identity: None,
            attempt: None,
            established: None,
            connecting_watchdog: Watchdog::new(
                TimerKind::ConnectingWatchdog,
                config.connecting_watchdog,
            ),
            roam_watchdog: Watchdog::new(TimerKind::RoamWatchdog, config.roam_watchdog),
            not_found_count: 0,
            roam_associated: false,
            next_attempt_id: 0,
            connected: false,
            supplicant_state: SupplicantState::default(),
            rssi: None,
            link_speed_mbps: None,
            frequency_mhz: None,
            link_properties: LinkPropertiesSnapshot {
                interface_name: Some(config.interface_name.clone()),
                ..LinkPropertiesSnapshot::default()
            },
            agent: None,
            next_agent_id: 0,
            role: ClientRole::default(),
            screen_on: true,
            rssi_poll_enabled: false,
            rssi_poll: Watchdog::new(TimerKind::RssiPoll, config.rssi_poll_interval),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn target_network_id(&self) -> Option<NetworkId> {
        self.target_network_id
    }

    pub fn target_bssid(&self) -> &Bssid {
        &self.target_bssid
    }

    pub fn last_network_id(&self) -> Option<NetworkId> {
        self.last_network_id
    }

    pub fn last_bssid(&self) -> Option<&MacAddress> {
        self.last_bssid.as_ref()
    }

    pub fn is_auto_roaming(&self) -> bool {
        self.is_auto_roaming
    }

    pub fn is_user_selected(&self) -> bool {
        self.is_user_selected
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn ssid(&self) -> Option<&Ssid> {
        self.identity.as_ref().map(|identity| &identity.ssid)
    }

    pub fn not_found_count(&self) -> u32 {
        self.not_found_count
    }

    pub fn connecting_watchdog(&self) -> &Watchdog {
        &self.connecting_watchdog
    }

    pub fn roam_watchdog(&self) -> &Watchdog {
        &self.roam_watchdog
    }

    pub fn rssi_poll_timer(&self) -> &Watchdog {
        &self.rssi_poll
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn supplicant_state(&self) -> SupplicantState {
        self.supplicant_state
    }

    pub fn rssi(&self) -> Option<i32> {
        self.rssi
    }

    pub fn link_speed_mbps(&self) -> Option<u32> {
        self.link_speed_mbps
    }

    pub fn frequency_mhz(&self) -> Option<u32> {
        self.frequency_mhz
    }

    /// A copy of the cached L3 configuration.
    pub fn link_properties(&self) -> LinkPropertiesSnapshot {
        self.link_properties.clone()
    }

    pub fn agent(&self) -> Option<AgentToken> {
        self.agent
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn screen_on(&self) -> bool {
        self.screen_on
    }

    pub fn rssi_poll_enabled(&self) -> bool {
        self.rssi_poll_enabled
    }

    // ── Attempt lifecycle ────────────────────────────────────────────

    pub(crate) fn allocate_attempt_id(&mut self) -> u64 {
        self.next_attempt_id += 1;
        self.next_attempt_id
    }

    pub(crate) fn allocate_agent(&mut self) -> AgentToken {
        self.next_agent_id += 1;
        AgentToken(self.next_agent_id)
    }

    /// Reset per-attempt fields and record a new live attempt. The
    /// identity of the previous attempt is replaced here.
    pub(crate) fn start_attempt(
        &mut self,
        id: u64,
        kind: AttemptKind,
        identity: NetworkIdentity,
        target_bssid: Bssid,
        requester: Requester,
    ) {
        let user_selected = requester.is_user();
        self.target_network_id = Some(identity.network_id);
        self.target_bssid = target_bssid.clone();
        self.is_auto_roaming = matches!(kind, AttemptKind::Roam);
        self.is_user_selected = user_selected;
        self.not_found_count = 0;
        self.roam_associated = false;
        self.attempt = Some(Attempt {
            id,
            kind,
            network_id: identity.network_id,
            ssid: identity.ssid.clone(),
            target_bssid,
            requester,
            user_selected,
            started_at: Utc::now(),
        });
        self.identity = Some(identity);
    }

    /// Does a radio event name the network of the live attempt?
    pub(crate) fn matches_target(&self, network_id: Option<NetworkId>, ssid: Option<&Ssid>) -> bool {
        let Some(identity) = self.identity.as_ref() else {
            return false;
        };
        let id_ok = network_id.is_none_or(|id| Some(id) == self.target_network_id);
        let ssid_ok = ssid.is_none_or(|s| *s == identity.ssid);
        id_ok && ssid_ok
    }

    /// Build the report for an attempt ending now.
    pub(crate) fn report(
        &self,
        attempt: &Attempt,
        outcome: AttemptOutcome,
        bssid: Option<MacAddress>,
    ) -> AttemptReport {
        let bssid = bssid
            .or_else(|| self.last_bssid.clone())
            .or_else(|| attempt.target_bssid.as_mac().cloned());
        AttemptReport {
            attempt_id: attempt.id,
            kind: attempt.kind,
            outcome,
            network_id: attempt.network_id,
            ssid: attempt.ssid.clone(),
            bssid,
            rssi: self.rssi,
            frequency_mhz: self.frequency_mhz,
            user_selected: attempt.user_selected,
            requester: attempt.requester.clone(),
            started_at: attempt.started_at,
            ended_at: Utc::now(),
        }
    }

    /// Forget everything about the previous connection. Device-level
    /// fields (role, screen state, poll preference) survive.
    pub(crate) fn reset_after_disconnect(&mut self) {
        self.target_network_id = None;
        self.target_bssid = Bssid::Any;
        self.last_network_id = None;
        self.last_bssid = None;
        self.is_auto_roaming = false;
        self.is_user_selected = false;
        self.identity = None;
        self.attempt = None;
        self.established = None;
        self.not_found_count = 0;
        self.roam_associated = false;
        self.connected = false;
        self.rssi = None;
        self.link_speed_mbps = None;
        self.frequency_mhz = None;
        self.link_properties.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credential, IpAssignment, SecurityType};

    fn identity(id: u32, ssid: &str) -> NetworkIdentity {
        NetworkIdentity {
            network_id: NetworkId(id),
            ssid: Ssid::new(ssid),
            security: SecurityType::Open,
            credential: Credential::None,
            ip_assignment: IpAssignment::Dynamic,
            hidden: false,
        }
    }

    #[test]
    fn start_attempt_resets_per_attempt_fields() {
        let mut ctx = ConnectionContext::new(&ClientModeConfig::default());
        ctx.not_found_count = 2;
        let id = ctx.allocate_attempt_id();
        ctx.start_attempt(
            id,
            AttemptKind::Connect,
            identity(5, "home"),
            Bssid::Any,
            Requester {
                uid: 10_042,
                package: Some("com.example.settings".into()),
            },
        );

        assert_eq!(ctx.target_network_id(), Some(NetworkId(5)));
        assert_eq!(ctx.not_found_count(), 0);
        assert!(ctx.is_user_selected());
        assert!(!ctx.is_auto_roaming());
        assert_eq!(ctx.attempt().map(|a| a.id), Some(1));
    }

    #[test]
    fn target_matching_uses_id_and_ssid() {
        let mut ctx = ConnectionContext::new(&ClientModeConfig::default());
        assert!(!ctx.matches_target(Some(NetworkId(5)), None));

        ctx.start_attempt(
            1,
            AttemptKind::Connect,
            identity(7, "office"),
            Bssid::Any,
            Requester::system(),
        );
        assert!(ctx.matches_target(Some(NetworkId(7)), Some(&Ssid::new("office"))));
        assert!(ctx.matches_target(None, Some(&Ssid::new("office"))));
        assert!(!ctx.matches_target(Some(NetworkId(5)), Some(&Ssid::new("office"))));
        assert!(!ctx.matches_target(Some(NetworkId(7)), Some(&Ssid::new("home"))));
    }

    #[test]
    fn reset_keeps_interface_name_and_device_fields() {
        let config = ClientModeConfig::default();
        let mut ctx = ConnectionContext::new(&config);
        ctx.screen_on = false;
        ctx.last_network_id = Some(NetworkId(5));
        ctx.connected = true;
        ctx.reset_after_disconnect();

        assert_eq!(ctx.last_network_id(), None);
        assert!(!ctx.is_connected());
        assert!(!ctx.screen_on());
        assert_eq!(
            ctx.link_properties().interface_name.as_deref(),
            Some(config.interface_name.as_str())
        );
    }
}
