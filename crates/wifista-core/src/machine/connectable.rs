// ── Connectable / Disconnected handlers ──
//
// The root state owns everything that is valid regardless of link
// state: starting attempts, device-level toggles and supplicant
// bookkeeping.

use tracing::{debug, info, warn};

use super::{AttemptEnd, Disposition, LeafState, Signal, StateMachine};
use crate::command::{Command, CommandResult};
use crate::error::CoreError;
use crate::event::{IpEventKind, RadioEvent, TimerKind};
use crate::context::Attempt;
use crate::ip::{ProvisioningMode, ProvisioningRequest};
use crate::model::{
    AssocRejectReason, AttemptKind, AttemptOutcome, Bssid, DetailedState, NetworkId,
    NetworkIdentity, Requester,
};

impl StateMachine {
    pub(super) fn connectable_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<CommandResult>, CoreError> {
        match command {
            Command::StartConnect {
                network_id,
                requester,
                bssid,
            } => self
                .begin_connect(*network_id, requester, bssid)
                .map(Some),
            Command::Reconnect { work_source } => {
                info!(requesters = work_source.0.len(), "reconnect requested");
                self.services.selection.reconnect_requested(work_source);
                Ok(Some(CommandResult::Ok))
            }
            Command::RssiPollEnable { enabled } => {
                self.ctx.rssi_poll_enabled = *enabled;
                self.refresh_rssi_polling();
                Ok(Some(CommandResult::Ok))
            }
            Command::ScreenStateChanged { screen_on } => {
                debug!(screen_on, "screen state changed");
                self.ctx.screen_on = *screen_on;
                self.services.radio.set_suspend_optimizations(!*screen_on);
                self.refresh_rssi_polling();
                Ok(Some(CommandResult::Ok))
            }
            Command::RoleChanged { role } => {
                info!(%role, "client role changed");
                self.ctx.role = *role;
                self.push_agent_info();
                Ok(Some(CommandResult::Ok))
            }
            Command::StartRoam { .. } | Command::Disconnect { .. } | Command::Reassociate => {
                Ok(None)
            }
        }
    }

    pub(super) fn connecting_or_connected_command(
        &mut self,
        command: &Command,
    ) -> Result<Option<CommandResult>, CoreError> {
        let Command::Disconnect { reason } = command else {
            return Ok(None);
        };
        info!(%reason, state = %self.leaf, "disconnect requested");
        self.services.radio.disconnect();
        let end = self
            .ctx
            .attempt
            .is_some()
            .then(|| AttemptEnd::new(AttemptOutcome::Cancelled));
        self.handle_network_disconnect(end);
        Ok(Some(CommandResult::Ok))
    }

    pub(super) fn disconnected_command(command: &Command) -> Option<CommandResult> {
        match command {
            Command::Disconnect { .. } => {
                debug!("already disconnected");
                Some(CommandResult::Ignored)
            }
            _ => None,
        }
    }

    /// Start a new connect attempt, superseding whatever is in flight.
    fn begin_connect(
        &mut self,
        network_id: NetworkId,
        requester: &Requester,
        bssid: &Bssid,
    ) -> Result<CommandResult, CoreError> {
        let identity = self
            .services
            .networks
            .identity(network_id)
            .ok_or(CoreError::NetworkNotFound { network_id })?;

        let attempt_id = self.ctx.allocate_attempt_id();
        if let Err(err) = self.services.radio.connect(&identity, bssid) {
            warn!(%network_id, attempt_id, error = %err, "radio refused association request");
            self.report_refused_attempt(attempt_id, &identity, bssid, requester);
            return Err(err.into());
        }

        self.supersede_attempt();
        info!(
            %network_id,
            ssid = %identity.ssid,
            %bssid,
            attempt_id,
            requester = %requester,
            "starting connect attempt"
        );
        self.ctx.start_attempt(
            attempt_id,
            AttemptKind::Connect,
            identity,
            bssid.clone(),
            requester.clone(),
        );

        self.ip
            .ensure_created(self.services.ip.as_mut(), self.timers.as_ref());
        if self.config.pre_association_provisioning {
            if let Some(request) = self.provisioning_request(ProvisioningMode::FastConnect) {
                debug!(%network_id, "starting fast-connect provisioning before association");
                self.ip.start_provisioning(request, self.services.ip.as_mut());
            }
        }

        if self.leaf == LeafState::L2Connecting {
            self.reenter(LeafState::L2Connecting);
        } else {
            self.transition_to(LeafState::L2Connecting);
        }
        Ok(CommandResult::AttemptStarted { attempt_id })
    }

    /// Retire the live attempt without reporting it. Its watchdogs are
    /// invalidated so anything already queued for it is inert.
    fn supersede_attempt(&mut self) {
        if let Some(old) = self.ctx.attempt.take() {
            debug!(
                attempt_id = old.id,
                network_id = %old.network_id,
                "superseding in-flight attempt"
            );
        }
        self.ctx.connecting_watchdog.cancel();
        self.ctx.roam_watchdog.cancel();
        self.ctx.rssi_poll.cancel();
        self.ip.stop(self.services.ip.as_mut());
        self.ctx.link_properties.clear();
        self.ctx.established = None;
        self.ctx.connected = false;
        self.ctx.last_network_id = None;
        self.ctx.last_bssid = None;
    }

    fn report_refused_attempt(
        &mut self,
        attempt_id: u64,
        identity: &NetworkIdentity,
        bssid: &Bssid,
        requester: &Requester,
    ) {
        let attempt = Attempt {
            id: attempt_id,
            kind: AttemptKind::Connect,
            network_id: identity.network_id,
            ssid: identity.ssid.clone(),
            target_bssid: bssid.clone(),
            requester: requester.clone(),
            user_selected: requester.is_user(),
            started_at: chrono::Utc::now(),
        };
        let outcome = AttemptOutcome::AssociationRejected(AssocRejectReason::LocallyRefused);
        let mut report = self.ctx.report(&attempt, outcome, None);
        report.bssid = bssid.as_mac().cloned();
        self.services.selection.attempt_ended(&report);
    }

    /// Build the provisioning request for the live identity.
    pub(super) fn provisioning_request(
        &self,
        mode: ProvisioningMode,
    ) -> Option<ProvisioningRequest> {
        let identity = self.ctx.identity.as_ref()?;
        Some(ProvisioningRequest {
            mode,
            network_id: identity.network_id,
            ssid: identity.ssid.clone(),
            bssid: self.ctx.last_bssid.clone(),
        })
    }

    // ── Signals ──────────────────────────────────────────────────────

    pub(super) fn connectable_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Radio(RadioEvent::SupplicantStateChanged {
                network_id,
                ssid,
                bssid,
                frequency_mhz,
                state,
            }) => {
                debug!(
                    %state,
                    network_id = ?network_id,
                    ssid = ?ssid,
                    bssid = ?bssid,
                    "supplicant state changed"
                );
                self.ctx.supplicant_state = *state;
                if frequency_mhz.is_some() {
                    self.ctx.frequency_mhz = *frequency_mhz;
                }
                if self.leaf == LeafState::L2Connecting {
                    let detailed = state.detailed();
                    if detailed != DetailedState::Disconnected {
                        self.set_detailed(detailed);
                    }
                }
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::TargetBssidChanged { bssid }) => {
                debug!(%bssid, "target bssid updated");
                self.ctx.target_bssid = bssid.clone();
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::Created) => {
                debug!("ip session ready");
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::LinkPropertiesChanged(update)) => {
                // Kept even when idle so the interface name survives.
                if update.interface_name.is_some() {
                    self.ctx.link_properties.interface_name = update.interface_name.clone();
                }
                Disposition::Handled
            }
            Signal::Timer(TimerKind::IpClientStartup) => {
                warn!("ip session failed to start with no attempt in flight");
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    pub(super) fn disconnected_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Radio(
                RadioEvent::NetworkConnected { .. }
                | RadioEvent::NetworkDisconnected { .. }
                | RadioEvent::AssociationRejected { .. }
                | RadioEvent::AuthenticationFailure { .. }
                | RadioEvent::NetworkNotFound { .. },
            ) => {
                debug!(event = signal.name(), "ignoring link event while disconnected");
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }
}
