// ── IP-coordinator session protocol ──
//
// The IP coordinator is an external service with its own startup and
// shutdown latency. Every instance we create is identified by a
// `SessionToken`; callbacks carry the token and anything from a session
// that is neither current nor retiring is dropped. Each provisioning
// run on a session gets its own `ProvisioningRun` epoch, so results from
// a run that was stopped are dropped even though the session lives on.
//
// Sequencing rules:
//   create ─▶ wait for Created (bounded) ─▶ provisioning commands allowed
//   shutdown ─▶ wait for ShutdownComplete (bounded) ─▶ next create allowed

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ClientModeConfig;
use crate::event::{IpEventKind, TimerKind};
use crate::model::{MacAddress, NetworkId, Ssid, StaticIpConfig};
use crate::service::IpProvisioner;
use crate::watchdog::{TimerService, Watchdog};

/// Epoch of one IP-coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub u64);

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ip#{}", self.0)
    }
}

/// Epoch of one provisioning run within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisioningRun(pub u64);

impl fmt::Display for ProvisioningRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

// ── Provisioning requests ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningMode {
    /// DHCPv4 plus SLAAC.
    Dynamic,
    Static(StaticIpConfig),
    /// DHCP started before association completes; reconciled once the
    /// link is up.
    FastConnect,
}

impl ProvisioningMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Static(_) => "static",
            Self::FastConnect => "fast-connect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub mode: ProvisioningMode,
    pub network_id: NetworkId,
    pub ssid: Ssid,
    #[serde(default)]
    pub bssid: Option<MacAddress>,
}

// ── Session lifecycle ───────────────────────────────────────────────

/// What the current session is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionPhase {
    /// `create` issued, waiting for `Created`.
    Creating,
    /// Ready for provisioning commands.
    Ready,
    /// Provisioning has been started on this session.
    Provisioning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Provisioning {
    Idle,
    /// Requested before the session was ready.
    Pending(ProvisioningRequest),
    Running(ProvisioningMode, ProvisioningRun),
}

/// Result of a callback that finished a sequencing wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The session is ready and nothing was queued.
    Ready,
    /// The session is ready and queued provisioning was started.
    ProvisioningStarted,
    /// Not a callback we were waiting for.
    Ignored,
}

/// Tracks the single live IP-coordinator session for an interface plus
/// at most one session that is still shutting down.
#[derive(Debug)]
pub struct IpClientLifecycle {
    next_token: u64,
    next_run: u64,
    current: Option<(SessionToken, SessionPhase)>,
    retiring: Option<SessionToken>,
    create_after_shutdown: bool,
    provisioning: Provisioning,
    startup: Watchdog,
    shutdown: Watchdog,
}

impl IpClientLifecycle {
    pub fn new(config: &ClientModeConfig) -> Self {
        Self {
            next_token: 0,
            next_run: 0,
            current: None,
            retiring: None,
            create_after_shutdown: false,
            provisioning: Provisioning::Idle,
            startup: Watchdog::new(TimerKind::IpClientStartup, config.ip_client_startup_timeout),
            shutdown: Watchdog::new(
                TimerKind::IpClientShutdown,
                config.ip_client_shutdown_timeout,
            ),
        }
    }

    pub fn current(&self) -> Option<SessionToken> {
        self.current.map(|(token, _)| token)
    }

    pub fn phase(&self) -> Option<SessionPhase> {
        self.current.map(|(_, phase)| phase)
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            self.phase(),
            Some(SessionPhase::Ready | SessionPhase::Provisioning)
        )
    }

    /// Session still shutting down, if any.
    pub fn retiring(&self) -> Option<SessionToken> {
        self.retiring
    }

    pub fn is_current(&self, session: SessionToken) -> bool {
        self.current() == Some(session)
    }

    pub fn is_retiring(&self, session: SessionToken) -> bool {
        self.retiring == Some(session)
    }

    /// Waiting on either a startup or a shutdown.
    pub fn is_waiting(&self) -> bool {
        matches!(self.phase(), Some(SessionPhase::Creating)) || self.retiring.is_some()
    }

    pub fn provisioning_mode(&self) -> Option<&ProvisioningMode> {
        match &self.provisioning {
            Provisioning::Running(mode, _) => Some(mode),
            Provisioning::Idle | Provisioning::Pending(_) => None,
        }
    }

    /// The live provisioning run, if one is running.
    pub fn current_run(&self) -> Option<ProvisioningRun> {
        match &self.provisioning {
            Provisioning::Running(_, run) => Some(*run),
            Provisioning::Idle | Provisioning::Pending(_) => None,
        }
    }

    /// Whether a callback from the current session belongs to the live
    /// run. A tagged callback must name it; an untagged one passes only
    /// if it is not a provisioning result.
    pub fn accepts(&self, kind: &IpEventKind, run: Option<ProvisioningRun>) -> bool {
        match run {
            Some(run) => self.current_run() == Some(run),
            None => !kind.is_run_scoped(),
        }
    }

    pub fn startup_watchdog(&self) -> &Watchdog {
        &self.startup
    }

    pub fn shutdown_watchdog(&self) -> &Watchdog {
        &self.shutdown
    }

    /// Ask for a session. Reuses a live one, defers behind a retiring
    /// one, otherwise issues `create` and arms the startup watchdog.
    pub fn ensure_created(&mut self, ip: &mut dyn IpProvisioner, timers: &dyn TimerService) {
        if self.current.is_some() {
            return;
        }
        if let Some(retiring) = self.retiring {
            debug!(%retiring, "ip session still shutting down, deferring create");
            self.create_after_shutdown = true;
            return;
        }
        self.next_token += 1;
        let session = SessionToken(self.next_token);
        self.current = Some((session, SessionPhase::Creating));
        info!(%session, "creating ip session");
        ip.create(session);
        let generation = self.startup.arm(timers);
        debug!(%session, generation, "ip startup watchdog armed");
    }

    /// Handle `Created` from the coordinator.
    pub fn on_created(&mut self, session: SessionToken, ip: &mut dyn IpProvisioner) -> Readiness {
        match self.current {
            Some((token, SessionPhase::Creating)) if token == session => {}
            _ => return Readiness::Ignored,
        }
        self.startup.cancel();
        self.current = Some((session, SessionPhase::Ready));
        info!(%session, "ip session ready");

        match std::mem::replace(&mut self.provisioning, Provisioning::Idle) {
            Provisioning::Pending(request) => {
                self.start(session, request, ip);
                Readiness::ProvisioningStarted
            }
            other => {
                self.provisioning = other;
                Readiness::Ready
            }
        }
    }

    /// Start provisioning now if the session is ready, otherwise queue it
    /// until `Created` arrives. Returns `true` if it was started now.
    pub fn start_provisioning(
        &mut self,
        request: ProvisioningRequest,
        ip: &mut dyn IpProvisioner,
    ) -> bool {
        match self.current {
            Some((session, SessionPhase::Ready)) => {
                self.start(session, request, ip);
                true
            }
            Some((session, SessionPhase::Provisioning)) => {
                // Fast-connect reconciliation: restart with the real request.
                debug!(%session, mode = request.mode.name(), "restarting provisioning");
                ip.stop(session);
                self.start(session, request, ip);
                true
            }
            Some((session, SessionPhase::Creating)) => {
                debug!(%session, "ip session not ready, provisioning queued");
                self.provisioning = Provisioning::Pending(request);
                false
            }
            None if self.create_after_shutdown => {
                debug!("ip session being replaced, provisioning queued");
                self.provisioning = Provisioning::Pending(request);
                false
            }
            None => {
                warn!("provisioning requested without an ip session, queued");
                self.provisioning = Provisioning::Pending(request);
                false
            }
        }
    }

    fn start(
        &mut self,
        session: SessionToken,
        request: ProvisioningRequest,
        ip: &mut dyn IpProvisioner,
    ) {
        self.next_run += 1;
        let run = ProvisioningRun(self.next_run);
        info!(
            %session,
            %run,
            mode = request.mode.name(),
            network_id = %request.network_id,
            "starting ip provisioning"
        );
        ip.start_provisioning(session, run, &request);
        self.current = Some((session, SessionPhase::Provisioning));
        self.provisioning = Provisioning::Running(request.mode, run);
    }

    /// Stop provisioning on the current session. The session itself stays
    /// alive and ready for reuse; results from the stopped run no longer
    /// match any live run.
    pub fn stop(&mut self, ip: &mut dyn IpProvisioner) {
        self.provisioning = Provisioning::Idle;
        if let Some((session, SessionPhase::Provisioning)) = self.current {
            debug!(%session, "stopping ip provisioning");
            ip.stop(session);
            self.current = Some((session, SessionPhase::Ready));
        }
    }

    /// Retire the current session. With `recreate`, a fresh session is
    /// created as soon as the old one confirms shutdown (or the shutdown
    /// wait times out).
    pub fn begin_shutdown(
        &mut self,
        recreate: bool,
        ip: &mut dyn IpProvisioner,
        timers: &dyn TimerService,
    ) {
        self.provisioning = Provisioning::Idle;
        self.startup.cancel();
        match self.current.take() {
            Some((session, _)) => {
                info!(%session, recreate, "shutting down ip session");
                ip.shutdown(session);
                self.retiring = Some(session);
                self.create_after_shutdown = recreate;
                self.shutdown.arm(timers);
            }
            None if self.retiring.is_some() => {
                self.create_after_shutdown |= recreate;
            }
            None => {
                if recreate {
                    self.ensure_created(ip, timers);
                }
            }
        }
    }

    /// Handle `ShutdownComplete`. Returns `true` if the retiring session
    /// matched.
    pub fn on_shutdown_complete(
        &mut self,
        session: SessionToken,
        ip: &mut dyn IpProvisioner,
        timers: &dyn TimerService,
    ) -> bool {
        if self.retiring != Some(session) {
            return false;
        }
        self.shutdown.cancel();
        self.finish_retiring(ip, timers);
        true
    }

    /// Shutdown wait expired. The old session is abandoned and any
    /// callbacks it still emits are discarded.
    pub fn on_shutdown_timeout(
        &mut self,
        generation: u64,
        ip: &mut dyn IpProvisioner,
        timers: &dyn TimerService,
    ) -> bool {
        if !self.shutdown.fire(generation) {
            return false;
        }
        if let Some(session) = self.retiring {
            warn!(%session, "ip session did not confirm shutdown in time, abandoning it");
        }
        self.finish_retiring(ip, timers);
        true
    }

    fn finish_retiring(&mut self, ip: &mut dyn IpProvisioner, timers: &dyn TimerService) {
        self.retiring = None;
        if std::mem::take(&mut self.create_after_shutdown) {
            self.ensure_created(ip, timers);
        }
    }

    /// Startup wait expired. Returns `true` if the generation matched;
    /// the session is dropped and the caller reports the failure.
    pub fn on_startup_timeout(
        &mut self,
        generation: u64,
        ip: &mut dyn IpProvisioner,
        timers: &dyn TimerService,
    ) -> bool {
        if !self.startup.fire(generation) {
            return false;
        }
        if let Some(session) = self.current() {
            warn!(%session, "ip session did not become ready in time");
        }
        self.begin_shutdown(false, ip, timers);
        true
    }

    /// Cancel all waits, used when the station is torn down.
    pub fn cancel_watchdogs(&mut self) {
        self.startup.cancel();
        self.shutdown.cancel();
    }

    /// Shut the live session down for good. Nothing is recreated and
    /// the retiring session, if any, is forgotten.
    pub fn release(&mut self, ip: &mut dyn IpProvisioner) {
        self.cancel_watchdogs();
        self.provisioning = Provisioning::Idle;
        self.create_after_shutdown = false;
        self.retiring = None;
        if let Some((session, _)) = self.current.take() {
            info!(%session, "releasing ip session");
            ip.shutdown(session);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::event::TimerEvent;
    use crate::model::LinkPropertiesSnapshot;

    #[derive(Default)]
    struct Calls(Vec<String>);

    impl IpProvisioner for Calls {
        fn create(&mut self, session: SessionToken) {
            self.0.push(format!("create {session}"));
        }
        fn start_provisioning(
            &mut self,
            session: SessionToken,
            run: ProvisioningRun,
            request: &ProvisioningRequest,
        ) {
            self.0
                .push(format!("start {session} {run} {}", request.mode.name()));
        }
        fn confirm_reachability(&mut self, session: SessionToken, _bssid: &MacAddress) {
            self.0.push(format!("confirm {session}"));
        }
        fn complete_pre_dhcp_action(&mut self, session: SessionToken) {
            self.0.push(format!("pre-dhcp-done {session}"));
        }
        fn stop(&mut self, session: SessionToken) {
            self.0.push(format!("stop {session}"));
        }
        fn shutdown(&mut self, session: SessionToken) {
            self.0.push(format!("shutdown {session}"));
        }
    }

    #[derive(Default)]
    struct Timers(Mutex<Vec<(Duration, TimerEvent)>>);

    impl TimerService for Timers {
        fn schedule(&self, after: Duration, event: TimerEvent) {
            self.0.lock().unwrap().push((after, event));
        }
    }

    fn request(mode: ProvisioningMode) -> ProvisioningRequest {
        ProvisioningRequest {
            mode,
            network_id: NetworkId(5),
            ssid: Ssid::new("home"),
            bssid: None,
        }
    }

    #[test]
    fn provisioning_waits_for_created() {
        let mut ip = Calls::default();
        let timers = Timers::default();
        let mut lc = IpClientLifecycle::new(&ClientModeConfig::default());

        lc.ensure_created(&mut ip, &timers);
        assert!(!lc.start_provisioning(request(ProvisioningMode::Dynamic), &mut ip));
        assert_eq!(ip.0, vec!["create ip#1"]);

        assert_eq!(
            lc.on_created(SessionToken(1), &mut ip),
            Readiness::ProvisioningStarted
        );
        assert_eq!(ip.0, vec!["create ip#1", "start ip#1 run#1 dynamic"]);
        assert_eq!(lc.phase(), Some(SessionPhase::Provisioning));
    }

    #[test]
    fn create_is_deferred_behind_retiring_session() {
        let mut ip = Calls::default();
        let timers = Timers::default();
        let mut lc = IpClientLifecycle::new(&ClientModeConfig::default());

        lc.ensure_created(&mut ip, &timers);
        lc.on_created(SessionToken(1), &mut ip);
        lc.begin_shutdown(true, &mut ip, &timers);
        assert_eq!(lc.current(), None);
        assert!(lc.is_retiring(SessionToken(1)));

        // A stray callback from an unknown session does nothing.
        assert!(!lc.on_shutdown_complete(SessionToken(9), &mut ip, &timers));
        assert!(lc.on_shutdown_complete(SessionToken(1), &mut ip, &timers));
        assert_eq!(lc.current(), Some(SessionToken(2)));
        assert_eq!(ip.0, vec!["create ip#1", "shutdown ip#1", "create ip#2"]);
    }

    #[test]
    fn stale_created_is_ignored() {
        let mut ip = Calls::default();
        let timers = Timers::default();
        let mut lc = IpClientLifecycle::new(&ClientModeConfig::default());

        lc.ensure_created(&mut ip, &timers);
        assert_eq!(lc.on_created(SessionToken(42), &mut ip), Readiness::Ignored);
        assert_eq!(lc.phase(), Some(SessionPhase::Creating));
    }

    #[test]
    fn shutdown_timeout_still_recreates() {
        let mut ip = Calls::default();
        let timers = Timers::default();
        let mut lc = IpClientLifecycle::new(&ClientModeConfig::default());

        lc.ensure_created(&mut ip, &timers);
        lc.on_created(SessionToken(1), &mut ip);
        lc.begin_shutdown(true, &mut ip, &timers);
        let generation = lc.shutdown_watchdog().generation();

        assert!(lc.on_shutdown_timeout(generation, &mut ip, &timers));
        assert_eq!(lc.current(), Some(SessionToken(2)));
        // Late confirmation from the abandoned session is ignored.
        assert!(!lc.on_shutdown_complete(SessionToken(1), &mut ip, &timers));
    }

    #[test]
    fn every_run_gets_a_fresh_epoch() {
        let mut ip = Calls::default();
        let timers = Timers::default();
        let mut lc = IpClientLifecycle::new(&ClientModeConfig::default());
        let success = IpEventKind::ProvisioningSuccess(LinkPropertiesSnapshot::default());

        lc.ensure_created(&mut ip, &timers);
        lc.on_created(SessionToken(1), &mut ip);
        assert!(lc.start_provisioning(request(ProvisioningMode::Dynamic), &mut ip));
        assert_eq!(lc.current_run(), Some(ProvisioningRun(1)));
        assert!(lc.accepts(&success, Some(ProvisioningRun(1))));

        lc.stop(&mut ip);
        assert_eq!(lc.current_run(), None);
        assert!(!lc.accepts(&success, Some(ProvisioningRun(1))));

        assert!(lc.start_provisioning(request(ProvisioningMode::Dynamic), &mut ip));
        assert_eq!(lc.current_run(), Some(ProvisioningRun(2)));
        assert!(!lc.accepts(&success, Some(ProvisioningRun(1))));
        assert!(lc.accepts(&success, Some(ProvisioningRun(2))));
        // Same session throughout.
        assert_eq!(lc.current(), Some(SessionToken(1)));
    }

    #[test]
    fn untagged_results_are_refused_but_session_callbacks_pass() {
        let mut ip = Calls::default();
        let timers = Timers::default();
        let mut lc = IpClientLifecycle::new(&ClientModeConfig::default());

        lc.ensure_created(&mut ip, &timers);
        lc.on_created(SessionToken(1), &mut ip);
        lc.start_provisioning(request(ProvisioningMode::Dynamic), &mut ip);

        assert!(!lc.accepts(&IpEventKind::ProvisioningFailure, None));
        assert!(lc.accepts(&IpEventKind::Created, None));
        let update = IpEventKind::LinkPropertiesChanged(LinkPropertiesSnapshot::default());
        assert!(lc.accepts(&update, None));
    }
}
