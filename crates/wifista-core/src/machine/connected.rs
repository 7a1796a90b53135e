// ── L2Connected and its L3 children ──
//
// Once associated, a network agent is registered for the lifetime of
// the L2Connected branch. Roaming and IP re-provisioning happen inside
// the branch so the agent survives them.

use tracing::{debug, error, info, warn};

use super::{AttemptEnd, Disposition, LeafState, Signal, StateMachine};
use crate::command::{Command, CommandResult};
use crate::config::ReachabilityPolicy;
use crate::error::CoreError;
use crate::event::{AgentEventKind, IpEventKind, RadioEvent, TimerKind};
use crate::ip::ProvisioningMode;
use crate::model::{AttemptKind, AttemptOutcome, Bssid, IpAssignment};
use crate::service::AgentInfo;

impl StateMachine {
    // ── L2Connected ──────────────────────────────────────────────────

    pub(super) fn enter_l2_connected(&mut self) {
        if let Some(existing) = self.ctx.agent.take() {
            error!(agent = %existing, "network agent already registered; replacing it");
            self.services.presenter.unregister(existing);
        }
        let Some(info) = self.agent_info() else {
            error!("associated without a network identity; no agent registered");
            return;
        };
        let agent = self.ctx.allocate_agent();
        info!(%agent, network_id = %info.network_id, "registering network agent");
        self.services.presenter.register(agent, &info);
        self.ctx.agent = Some(agent);
        self.push_link_properties();
    }

    pub(super) fn exit_l2_connected(&mut self) {
        self.ctx.rssi_poll.cancel();
        if let Some(agent) = self.ctx.agent.take() {
            info!(%agent, "unregistering network agent");
            self.services.presenter.unregister(agent);
        }
    }

    pub(super) fn l2_connected_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<CommandResult>, CoreError> {
        match command {
            Command::Reassociate => {
                info!(network_id = ?self.ctx.last_network_id, "reassociating");
                self.services.radio.reassociate()?;
                Ok(Some(CommandResult::Ok))
            }
            _ => Ok(None),
        }
    }

    pub(super) fn l2_connected_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Radio(RadioEvent::NetworkDisconnected {
                bssid,
                reason_code,
                locally_generated,
                ..
            }) => {
                let outcome = if *locally_generated {
                    info!(reason_code, "link dropped locally");
                    AttemptOutcome::Cancelled
                } else {
                    warn!(bssid = ?bssid, reason_code, "link dropped by the access point");
                    AttemptOutcome::Disconnection
                };
                self.handle_network_disconnect(Some(AttemptEnd::new(outcome).on(bssid.clone())));
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::LinkPropertiesChanged(update)) => {
                self.ctx.link_properties.merge(update.clone());
                self.push_link_properties();
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::ProvisioningFailure) => {
                warn!(network_id = ?self.ctx.last_network_id, "ip provisioning failed");
                self.services.radio.disconnect();
                self.handle_network_disconnect(Some(AttemptEnd::new(AttemptOutcome::Dhcp)));
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::ReachabilityLost { reason }) => {
                warn!(%reason, state = %self.leaf, "ip configuration lost");
                self.services.radio.disconnect();
                self.handle_network_disconnect(Some(AttemptEnd::new(
                    AttemptOutcome::IpReachabilityLost,
                )));
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::PreDhcpAction) => {
                self.services.radio.set_power_save(false);
                if let Some(session) = self.ip.current() {
                    self.services.ip.complete_pre_dhcp_action(session);
                }
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::PostDhcpAction) => {
                self.services.radio.set_power_save(true);
                Disposition::Handled
            }
            Signal::Agent(AgentEventKind::Validation { valid }) => {
                if let Some(network_id) = self.ctx.last_network_id {
                    info!(%network_id, valid, "network validation result");
                    self.services.selection.validation_result(network_id, valid);
                    self.services.networks.record_validation(network_id, valid);
                }
                Disposition::Handled
            }
            Signal::Agent(AgentEventKind::Unwanted) => {
                info!(network_id = ?self.ctx.last_network_id, "network unwanted, disconnecting");
                self.services.radio.disconnect();
                let end = self
                    .ctx
                    .attempt
                    .is_some()
                    .then(|| AttemptEnd::new(AttemptOutcome::Cancelled));
                self.handle_network_disconnect(end);
                Disposition::Handled
            }
            Signal::Timer(TimerKind::RssiPoll) => {
                self.poll_signal();
                self.refresh_rssi_polling();
                Disposition::Handled
            }
            Signal::Timer(TimerKind::IpClientStartup) => {
                warn!("ip session did not become ready, disconnecting");
                self.services.radio.disconnect();
                self.handle_network_disconnect(Some(AttemptEnd::new(
                    AttemptOutcome::IpClientStartupTimeout,
                )));
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    // ── WaitBeforeL3Provisioning ─────────────────────────────────────

    pub(super) fn enter_wait_before_l3(&mut self) {
        info!(network_id = ?self.ctx.last_network_id, "recreating ip session");
        self.ip
            .begin_shutdown(true, self.services.ip.as_mut(), self.timers.as_ref());
        self.ctx.link_properties.clear();
        self.push_link_properties();
    }

    pub(super) fn wait_before_l3_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Ip(IpEventKind::Created) => {
                debug!("replacement ip session ready");
                self.transition_to(LeafState::L3Provisioning);
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::ReachabilityLost { reason }) => {
                debug!(%reason, "ignoring reachability loss while recreating ip session");
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    // ── L3Provisioning ───────────────────────────────────────────────

    pub(super) fn enter_l3_provisioning(&mut self) {
        let mode = self.configured_provisioning_mode();
        if mode == ProvisioningMode::Dynamic
            && self.ip.provisioning_mode() == Some(&ProvisioningMode::FastConnect)
        {
            debug!("fast-connect provisioning already running; keeping it");
            return;
        }

        let Some(request) = self.provisioning_request(mode) else {
            error!("entered l3 provisioning without a network identity");
            return;
        };
        self.ip
            .ensure_created(self.services.ip.as_mut(), self.timers.as_ref());
        self.ip.start_provisioning(request, self.services.ip.as_mut());
    }

    pub(super) fn l3_provisioning_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Ip(IpEventKind::ProvisioningSuccess(properties)) => {
                info!(
                    network_id = ?self.ctx.last_network_id,
                    addresses = properties.addresses.len(),
                    "ip provisioning succeeded"
                );
                self.ctx.link_properties.merge(properties.clone());
                self.push_link_properties();
                self.transition_to(LeafState::L3Connected);
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::Created) => {
                // Queued provisioning was started by the session lifecycle.
                debug!("ip session ready during provisioning");
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    // ── L3Connected ──────────────────────────────────────────────────

    pub(super) fn enter_l3_connected(&mut self) {
        self.ctx.connected = true;
        self.complete_attempt();
        if let Some(agent) = self.ctx.agent {
            self.services.presenter.mark_connected(agent);
        }
        self.refresh_rssi_polling();
    }

    pub(super) fn l3_connected_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<CommandResult>, CoreError> {
        let Command::StartRoam { network_id, bssid } = command else {
            return Ok(None);
        };
        if Some(*network_id) != self.ctx.last_network_id {
            return Err(CoreError::Rejected {
                message: format!("cannot roam to network {network_id}: not the current network"),
            });
        }
        let identity = self
            .services
            .networks
            .identity(*network_id)
            .ok_or(CoreError::NetworkNotFound {
                network_id: *network_id,
            })?;

        self.services.radio.roam(*network_id, bssid)?;

        let attempt_id = self.ctx.allocate_attempt_id();
        let requester = self
            .ctx
            .established
            .as_ref()
            .map(|attempt| attempt.requester.clone())
            .unwrap_or_default();
        info!(%network_id, %bssid, attempt_id, "starting roam");
        self.ctx.start_attempt(
            attempt_id,
            AttemptKind::Roam,
            identity,
            bssid.clone(),
            requester,
        );
        self.transition_to(LeafState::Roaming);
        Ok(Some(CommandResult::AttemptStarted { attempt_id }))
    }

    pub(super) fn l3_connected_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Ip(IpEventKind::ReachabilityLost { reason }) => {
                match self.config.reachability_policy {
                    ReachabilityPolicy::Disconnect => {
                        warn!(%reason, "ip reachability lost, disconnecting");
                        self.services.radio.disconnect();
                        self.handle_network_disconnect(Some(AttemptEnd::new(
                            AttemptOutcome::IpReachabilityLost,
                        )));
                    }
                    ReachabilityPolicy::Reprovision => {
                        warn!(%reason, "ip reachability lost, re-provisioning");
                        self.transition_to(LeafState::WaitBeforeL3Provisioning);
                    }
                }
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::NetworkConnected {
                network_id,
                ssid,
                bssid,
            }) => {
                if Some(*network_id) != self.ctx.last_network_id {
                    debug!(%network_id, %ssid, "dropping connect event for another network");
                    return Disposition::Handled;
                }
                if self.ctx.last_bssid.as_ref() == Some(bssid) {
                    return Disposition::Handled;
                }
                info!(%network_id, %bssid, previous = ?self.ctx.last_bssid, "firmware roam");
                self.ctx.last_bssid = Some(bssid.clone());
                self.ctx.target_bssid = Bssid::Mac(bssid.clone());
                if let Some(session) = self.ip.current() {
                    self.services.ip.confirm_reachability(session, bssid);
                }
                self.push_agent_info();
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    // ── Shared helpers ───────────────────────────────────────────────

    /// DHCP or static, per the attempt's network identity.
    pub(super) fn configured_provisioning_mode(&self) -> ProvisioningMode {
        match self.ctx.identity.as_ref().map(|identity| &identity.ip_assignment) {
            Some(IpAssignment::Static(config)) => ProvisioningMode::Static(config.clone()),
            Some(IpAssignment::Dynamic) | None => ProvisioningMode::Dynamic,
        }
    }

    /// What the presenter should know about the current link. `None`
    /// only when no attempt identity is held.
    pub(super) fn agent_info(&self) -> Option<AgentInfo> {
        let identity = self.ctx.identity.as_ref()?;
        Some(AgentInfo {
            network_id: self.ctx.last_network_id.unwrap_or(identity.network_id),
            ssid: identity.ssid.clone(),
            bssid: self.ctx.last_bssid.clone(),
            role: self.ctx.role,
            rssi: self.ctx.rssi,
        })
    }

    pub(super) fn push_agent_info(&mut self) {
        if let (Some(agent), Some(info)) = (self.ctx.agent, self.agent_info()) {
            self.services.presenter.update_info(agent, &info);
        }
    }

    pub(super) fn push_link_properties(&mut self) {
        if let Some(agent) = self.ctx.agent {
            let properties = self.ctx.link_properties();
            self.services
                .presenter
                .update_link_properties(agent, &properties);
        }
    }

    fn poll_signal(&mut self) {
        let Some(poll) = self.services.radio.poll_signal() else {
            debug!("signal poll returned nothing");
            return;
        };
        self.ctx.rssi = Some(poll.rssi);
        if poll.link_speed_mbps.is_some() {
            self.ctx.link_speed_mbps = poll.link_speed_mbps;
        }
        if poll.frequency_mhz.is_some() {
            self.ctx.frequency_mhz = poll.frequency_mhz;
        }
        if let Some(network_id) = self.ctx.last_network_id {
            self.services.selection.signal_updated(network_id, &poll);
        }
        self.push_agent_info();
    }

    /// Poll while connected and either the screen is on or polling was
    /// explicitly enabled.
    pub(super) fn refresh_rssi_polling(&mut self) {
        let wanted = self.ctx.connected && (self.ctx.screen_on || self.ctx.rssi_poll_enabled);
        if wanted && !self.ctx.rssi_poll.is_armed() {
            self.ctx.rssi_poll.arm(self.timers.as_ref());
        } else if !wanted {
            self.ctx.rssi_poll.cancel();
        }
    }
}
