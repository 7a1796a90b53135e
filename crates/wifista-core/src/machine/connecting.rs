// ── L2Connecting ──
//
// Association and authentication in flight. Events naming any network
// other than the attempt's target are leftovers from a superseded
// attempt and are dropped.

use tracing::{debug, info, warn};

use super::{AttemptEnd, Disposition, LeafState, Signal, StateMachine};
use crate::event::{RadioEvent, TimerKind};
use crate::ip::ProvisioningMode;
use crate::model::{AssocRejectReason, AttemptOutcome, DetailedState};

impl StateMachine {
    pub(super) fn enter_l2_connecting(&mut self) {
        self.set_detailed(DetailedState::Connecting);
        let generation = self.ctx.connecting_watchdog.arm(self.timers.as_ref());
        debug!(
            network_id = ?self.ctx.target_network_id,
            generation,
            "connecting watchdog armed"
        );
    }

    pub(super) fn l2_connecting_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Radio(RadioEvent::NetworkConnected {
                network_id,
                ssid,
                bssid,
            }) => {
                if !self.ctx.matches_target(Some(*network_id), Some(ssid)) {
                    debug!(%network_id, %ssid, "dropping connect event for superseded attempt");
                    return Disposition::Handled;
                }
                if !self.ctx.target_bssid.accepts(bssid) {
                    debug!(
                        %bssid,
                        requested = %self.ctx.target_bssid,
                        "associated to a different bss than requested"
                    );
                }
                info!(%network_id, %ssid, %bssid, "associated");
                self.ctx.last_network_id = Some(*network_id);
                self.ctx.last_bssid = Some(bssid.clone());
                self.ctx.not_found_count = 0;
                self.transition_to(LeafState::L3Provisioning);
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::AssociationRejected {
                ssid,
                bssid,
                status_code,
                timed_out,
            }) => {
                if !self.ctx.matches_target(None, Some(ssid)) {
                    debug!(%ssid, "dropping association rejection for superseded attempt");
                    return Disposition::Handled;
                }
                let reason = AssocRejectReason::from_status(*status_code);
                let outcome = if *timed_out {
                    AttemptOutcome::AssociationTimeout
                } else {
                    AttemptOutcome::AssociationRejected(reason)
                };
                let block_for = (reason == AssocRejectReason::ApBusy && !*timed_out)
                    .then_some(self.config.busy_ap_block_duration);
                warn!(
                    %ssid,
                    bssid = ?bssid,
                    status_code,
                    timed_out,
                    %outcome,
                    "association rejected"
                );
                self.fail_connecting(
                    AttemptEnd::new(outcome)
                        .on(bssid.clone())
                        .blocked_for(block_for),
                );
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::AuthenticationFailure { ssid, bssid, reason }) => {
                if !self.ctx.matches_target(None, Some(ssid)) {
                    debug!(%ssid, "dropping authentication failure for superseded attempt");
                    return Disposition::Handled;
                }
                warn!(%ssid, bssid = ?bssid, %reason, "authentication failed");
                self.fail_connecting(
                    AttemptEnd::new(AttemptOutcome::AuthenticationFailure(*reason))
                        .on(bssid.clone()),
                );
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::NetworkNotFound { ssid }) => {
                if !self.ctx.matches_target(None, Some(ssid)) {
                    return Disposition::Handled;
                }
                self.ctx.not_found_count += 1;
                let threshold = self.config.network_not_found_threshold;
                debug!(%ssid, count = self.ctx.not_found_count, threshold, "network not found");
                if self.ctx.not_found_count >= threshold {
                    warn!(%ssid, "network not found, giving up");
                    self.fail_connecting(AttemptEnd::new(AttemptOutcome::NetworkNotFound));
                }
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::NetworkDisconnected {
                bssid,
                reason_code,
                locally_generated,
                ..
            }) => {
                if *locally_generated {
                    // The supplicant dropping the old link on our behalf.
                    debug!(reason_code, "local disconnect while connecting");
                } else {
                    warn!(bssid = ?bssid, reason_code, "disconnected while connecting");
                    self.fail_connecting(
                        AttemptEnd::new(AttemptOutcome::Disconnection).on(bssid.clone()),
                    );
                }
                Disposition::Handled
            }
            Signal::Timer(TimerKind::ConnectingWatchdog) => {
                warn!(
                    network_id = ?self.ctx.target_network_id,
                    timeout_secs = self.config.connecting_watchdog.as_secs(),
                    "connecting watchdog expired"
                );
                self.fail_connecting(AttemptEnd::new(AttemptOutcome::NetworkNotFound));
                Disposition::Handled
            }
            Signal::Timer(TimerKind::IpClientStartup) => {
                // Association can still finish; provisioning waits for the
                // replacement session.
                warn!(
                    attempt_id = ?self.ctx.attempt.as_ref().map(|a| a.id),
                    network_id = ?self.ctx.target_network_id,
                    "ip session did not become ready while associating, recreating it"
                );
                self.ip
                    .ensure_created(self.services.ip.as_mut(), self.timers.as_ref());
                if self.config.pre_association_provisioning {
                    if let Some(request) = self.provisioning_request(ProvisioningMode::FastConnect)
                    {
                        debug!("fast-connect provisioning queued for the replacement session");
                        self.ip.start_provisioning(request, self.services.ip.as_mut());
                    }
                }
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    /// End the attempt from L2Connecting. The radio is told to stop
    /// first so supplicant retries do not race the cleanup.
    fn fail_connecting(&mut self, end: AttemptEnd) {
        self.services.radio.disconnect();
        self.handle_network_disconnect(Some(end));
    }
}

