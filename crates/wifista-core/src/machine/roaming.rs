// ── Roaming ──
//
// A framework-initiated roam within the current network. The agent
// stays registered throughout; upper layers only notice a roam that
// fails. Success needs both re-association to the target and a fresh
// provisioning result, all inside the roam watchdog's budget.

use tracing::{debug, info, warn};

use super::{AttemptEnd, Disposition, LeafState, Signal, StateMachine};
use crate::event::{IpEventKind, RadioEvent, TimerKind};
use crate::model::{AssocRejectReason, AttemptOutcome, Bssid};

impl StateMachine {
    pub(super) fn enter_roaming(&mut self) {
        self.ctx.is_auto_roaming = true;
        self.ctx.roam_associated = false;
        let generation = self.ctx.roam_watchdog.arm(self.timers.as_ref());
        debug!(
            roam_target = %self.ctx.target_bssid,
            generation,
            "roam watchdog armed"
        );
    }

    pub(super) fn exit_roaming(&mut self) {
        self.ctx.roam_watchdog.cancel();
        self.ctx.is_auto_roaming = false;
        self.ctx.roam_associated = false;
    }

    pub(super) fn roaming_signal(&mut self, signal: Signal<'_>) -> Disposition {
        match signal {
            Signal::Radio(RadioEvent::NetworkConnected {
                network_id,
                ssid,
                bssid,
            }) => {
                if !self.ctx.matches_target(Some(*network_id), Some(ssid)) {
                    debug!(%network_id, %ssid, "dropping connect event for another network");
                    return Disposition::Handled;
                }
                info!(%network_id, %bssid, previous = ?self.ctx.last_bssid, "roam associated");
                self.ctx.last_bssid = Some(bssid.clone());
                self.ctx.target_bssid = Bssid::Mac(bssid.clone());
                self.ctx.roam_associated = true;
                self.push_agent_info();

                let mode = self.configured_provisioning_mode();
                if let Some(request) = self.provisioning_request(mode) {
                    self.ip
                        .ensure_created(self.services.ip.as_mut(), self.timers.as_ref());
                    self.ip.start_provisioning(request, self.services.ip.as_mut());
                }
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::ProvisioningSuccess(properties)) => {
                if !self.ctx.roam_associated {
                    debug!("provisioning result from before the roam, ignoring");
                    return Disposition::Handled;
                }
                info!(bssid = ?self.ctx.last_bssid, "roam complete");
                self.ctx.link_properties.merge(properties.clone());
                self.push_link_properties();
                self.transition_to(LeafState::L3Connected);
                Disposition::Handled
            }
            Signal::Ip(IpEventKind::ReachabilityLost { reason }) => {
                // Neighbours are expected to vanish while the BSS changes.
                debug!(%reason, "ignoring reachability loss during roam");
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::AssociationRejected {
                ssid,
                bssid,
                status_code,
                timed_out,
            }) => {
                if !self.ctx.matches_target(None, Some(ssid)) {
                    return Disposition::Handled;
                }
                let outcome = if *timed_out {
                    AttemptOutcome::AssociationTimeout
                } else {
                    AttemptOutcome::AssociationRejected(AssocRejectReason::from_status(*status_code))
                };
                warn!(%ssid, bssid = ?bssid, status_code, %outcome, "roam target rejected us");
                self.abandon_roam(AttemptEnd::new(outcome).on(bssid.clone()));
                Disposition::Handled
            }
            Signal::Radio(RadioEvent::AuthenticationFailure { ssid, bssid, reason }) => {
                if !self.ctx.matches_target(None, Some(ssid)) {
                    return Disposition::Handled;
                }
                warn!(%ssid, bssid = ?bssid, %reason, "roam authentication failed");
                self.abandon_roam(
                    AttemptEnd::new(AttemptOutcome::AuthenticationFailure(*reason))
                        .on(bssid.clone()),
                );
                Disposition::Handled
            }
            Signal::Timer(TimerKind::RoamWatchdog) => {
                warn!(
                    roam_target = %self.ctx.target_bssid,
                    timeout_secs = self.config.roam_watchdog.as_secs(),
                    "roam watchdog expired"
                );
                self.services.radio.disconnect();
                self.handle_network_disconnect(Some(AttemptEnd::new(AttemptOutcome::RoamTimeout)));
                Disposition::Handled
            }
            _ => Disposition::NotHandled,
        }
    }

    /// The roam target refused us but the old association is intact:
    /// report the roam attempt and fall back to `L3Connected`.
    fn abandon_roam(&mut self, end: AttemptEnd) {
        let reported = self.report_attempt(&end);
        debug!(reported, "returning to the current bss");
        self.transition_to(LeafState::L3Connected);
    }
}
