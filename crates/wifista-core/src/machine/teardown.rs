// ── Terminal exit path and outcome reporting ──
//
// Every failure funnels through `handle_network_disconnect`. It reports
// at most once (the attempt is taken out of the context before the
// report is built), so calling it again is harmless.

use std::time::Duration;

use tracing::{debug, info};

use super::{LeafState, StateMachine};
use crate::model::{AttemptKind, AttemptOutcome, AttemptReport, DetailedState, MacAddress};

/// How an attempt (or an established connection) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttemptEnd {
    pub outcome: AttemptOutcome,
    /// BSS the failure was observed on, if the event named one.
    pub bssid: Option<MacAddress>,
    /// Explicit blocklist duration; `None` defers to the blocklist.
    pub block_for: Option<Duration>,
}

impl AttemptEnd {
    pub fn new(outcome: AttemptOutcome) -> Self {
        Self {
            outcome,
            bssid: None,
            block_for: None,
        }
    }

    pub fn on(mut self, bssid: Option<MacAddress>) -> Self {
        self.bssid = bssid;
        self
    }

    pub fn blocked_for(mut self, duration: Option<Duration>) -> Self {
        self.block_for = duration;
        self
    }
}

impl StateMachine {
    /// The single terminal exit: cancel watchdogs, report, unregister
    /// the agent, stop provisioning, clear the context and land in
    /// `Disconnected`.
    pub(crate) fn handle_network_disconnect(&mut self, end: Option<AttemptEnd>) {
        self.ctx.connecting_watchdog.cancel();
        self.ctx.roam_watchdog.cancel();
        self.ctx.rssi_poll.cancel();

        if let Some(end) = end {
            if !self.report_attempt(&end) {
                self.report_connection_lost(&end);
            }
        }

        if let Some(agent) = self.ctx.agent.take() {
            info!(%agent, "unregistering network agent");
            self.services.presenter.unregister(agent);
        }
        self.ip.stop(self.services.ip.as_mut());
        self.ctx.reset_after_disconnect();

        if self.leaf == LeafState::Disconnected {
            self.set_detailed(DetailedState::Disconnected);
        } else {
            self.transition_to(LeafState::Disconnected);
        }
    }

    /// Stop the station for good: drop any link, release the IP session
    /// and leave every watchdog disarmed.
    pub fn shutdown(&mut self) {
        if self.leaf != LeafState::Disconnected {
            info!(state = %self.leaf, "station shutting down");
            self.services.radio.disconnect();
            let end = self
                .ctx
                .attempt
                .is_some()
                .then(|| AttemptEnd::new(AttemptOutcome::Cancelled));
            self.handle_network_disconnect(end);
            self.run_transitions();
        }
        self.ip.release(self.services.ip.as_mut());
    }

    /// Report the live attempt, if any. Returns `true` if one was reported.
    pub(crate) fn report_attempt(&mut self, end: &AttemptEnd) -> bool {
        let Some(attempt) = self.ctx.attempt.take() else {
            return false;
        };
        let report = self.ctx.report(&attempt, end.outcome, end.bssid.clone());
        info!(
            attempt_id = report.attempt_id,
            kind = %report.kind,
            network_id = %report.network_id,
            bssid = ?report.bssid,
            outcome = %report.outcome,
            "attempt ended"
        );
        self.services.selection.attempt_ended(&report);
        self.apply_failure_policy(&report, end.block_for);
        true
    }

    fn report_connection_lost(&mut self, end: &AttemptEnd) {
        if !self.ctx.connected || !end.outcome.is_failure() {
            debug!(outcome = %end.outcome, "nothing to report");
            return;
        }
        let Some(established) = self.ctx.established.clone() else {
            return;
        };
        let report = self.ctx.report(&established, end.outcome, end.bssid.clone());
        info!(
            network_id = %report.network_id,
            bssid = ?report.bssid,
            outcome = %report.outcome,
            "connection lost"
        );
        self.services.selection.connection_lost(&report);
        self.apply_failure_policy(&report, end.block_for);
    }

    /// Blocklist the BSS and count the failure against the network.
    fn apply_failure_policy(&mut self, report: &AttemptReport, block_for: Option<Duration>) {
        if !report.outcome.is_failure() {
            return;
        }
        if let (Some(reason), Some(bssid)) = (report.outcome.block_reason(), report.bssid.as_ref())
        {
            debug!(%bssid, %reason, ?block_for, "blocklisting bssid");
            self.services
                .blocklist
                .block_bssid(&report.ssid, bssid, reason, block_for);
        }
        // Roam failures leave the network itself in good standing.
        if report.kind == AttemptKind::Connect {
            if let Some(reason) = report.outcome.disable_reason() {
                self.services
                    .networks
                    .record_failure(report.network_id, reason);
            }
        }
    }

    /// Report the live attempt as a success and remember it as the
    /// attempt that established the connection.
    pub(crate) fn complete_attempt(&mut self) {
        let Some(attempt) = self.ctx.attempt.take() else {
            return;
        };
        let report = self.ctx.report(&attempt, AttemptOutcome::None, None);
        info!(
            attempt_id = report.attempt_id,
            kind = %report.kind,
            network_id = %report.network_id,
            bssid = ?report.bssid,
            elapsed_ms = u64::try_from(report.duration().as_millis()).unwrap_or(u64::MAX),
            "attempt succeeded"
        );
        self.services.selection.attempt_ended(&report);
        if let Some(bssid) = report.bssid.as_ref() {
            self.services
                .blocklist
                .connection_succeeded(&report.ssid, bssid);
        }
        self.services.networks.record_connected(report.network_id);
        self.ctx.established = Some(attempt);
    }
}
