// ── Connection state machine ──
//
// Synchronous core of the station. One event in, zero or more
// collaborator calls and transitions out. Dispatch tries the active
// leaf's handler first and then each ancestor, stopping at the first
// state that claims the event. Transitions requested by a handler are
// applied after it returns: exit actions run leaf-first up to (not
// including) the common ancestor, entry actions run top-down.

mod connectable;
mod connected;
mod connecting;
pub mod hierarchy;
mod roaming;
mod teardown;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::ClientModeConfig;
use crate::context::ConnectionContext;
use crate::error::CoreError;
use crate::event::{
    AgentEvent, AgentEventKind, Event, IpEvent, IpEventKind, RadioEvent, TimerEvent, TimerKind,
};
use crate::ip::{IpClientLifecycle, SessionToken};
use crate::model::{
    ClientRole, DetailedState, LinkPropertiesSnapshot, MacAddress, NetworkId, Ssid,
    SupplicantState,
};
use crate::service::Collaborators;
use crate::watchdog::TimerService;

pub use hierarchy::{LeafState, StateId, StateTree, UnknownState};
pub(crate) use teardown::AttemptEnd;

/// Whether a state claimed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Handled,
    NotHandled,
}

/// Non-command input after session/generation filtering.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Signal<'a> {
    Radio(&'a RadioEvent),
    Ip(&'a IpEventKind),
    Agent(AgentEventKind),
    Timer(TimerKind),
}

impl Signal<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Radio(ev) => ev.name(),
            Self::Ip(kind) => kind.name(),
            Self::Agent(AgentEventKind::Validation { .. }) => "agent-validation",
            Self::Agent(AgentEventKind::Unwanted) => "agent-unwanted",
            Self::Timer(kind) => kind.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    To(LeafState),
    /// Exit and re-enter the current leaf.
    Reenter(LeafState),
}

// ── Observation ─────────────────────────────────────────────────────

/// One observable change: a leaf transition or a detailed-state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub sequence: u64,
    pub at: DateTime<Utc>,
    pub previous: LeafState,
    pub state: LeafState,
    pub detailed: DetailedState,
    pub network_id: Option<NetworkId>,
}

/// Point-in-time view of the station, safe to hand to any observer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StationSnapshot {
    pub state: LeafState,
    pub detailed: DetailedState,
    pub supplicant: SupplicantState,
    pub target_network_id: Option<NetworkId>,
    pub last_network_id: Option<NetworkId>,
    pub ssid: Option<Ssid>,
    pub bssid: Option<MacAddress>,
    pub attempt_id: Option<u64>,
    pub rssi: Option<i32>,
    pub frequency_mhz: Option<u32>,
    pub role: ClientRole,
    pub ip_session: Option<SessionToken>,
    pub link_properties: LinkPropertiesSnapshot,
}

// ── StateMachine ────────────────────────────────────────────────────

pub struct StateMachine {
    config: ClientModeConfig,
    ctx: ConnectionContext,
    ip: IpClientLifecycle,
    services: Collaborators,
    timers: Box<dyn TimerService>,
    leaf: LeafState,
    detailed: DetailedState,
    pending: Option<Transition>,
    changes: Vec<StateChange>,
    sequence: u64,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("interface", &self.config.interface_name)
            .field("leaf", &self.leaf)
            .field("detailed", &self.detailed)
            .finish_non_exhaustive()
    }
}

impl StateMachine {
    /// Build a machine resting in `Disconnected` and ask the IP
    /// coordinator for its first session.
    pub fn new(
        config: ClientModeConfig,
        services: Collaborators,
        timers: Box<dyn TimerService>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let ctx = ConnectionContext::new(&config);
        let ip = IpClientLifecycle::new(&config);
        let mut machine = Self {
            config,
            ctx,
            ip,
            services,
            timers,
            leaf: LeafState::Disconnected,
            detailed: DetailedState::Idle,
            pending: None,
            changes: Vec::new(),
            sequence: 0,
        };
        debug!(interface = %machine.config.interface_name, "station state machine created");
        machine
            .ip
            .ensure_created(machine.services.ip.as_mut(), machine.timers.as_ref());
        machine.services.radio.set_suspend_optimizations(false);
        machine.set_detailed(DetailedState::Disconnected);
        Ok(machine)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn state(&self) -> LeafState {
        self.leaf
    }

    pub fn detailed_state(&self) -> DetailedState {
        self.detailed
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    pub fn ip_lifecycle(&self) -> &IpClientLifecycle {
        &self.ip
    }

    pub fn config(&self) -> &ClientModeConfig {
        &self.config
    }

    pub fn snapshot(&self) -> StationSnapshot {
        StationSnapshot {
            state: self.leaf,
            detailed: self.detailed,
            supplicant: self.ctx.supplicant_state,
            target_network_id: self.ctx.target_network_id,
            last_network_id: self.ctx.last_network_id,
            ssid: self.ctx.ssid().cloned(),
            bssid: self.ctx.last_bssid.clone(),
            attempt_id: self.ctx.attempt.as_ref().map(|attempt| attempt.id),
            rssi: self.ctx.rssi,
            frequency_mhz: self.ctx.frequency_mhz,
            role: self.ctx.role,
            ip_session: self.ip.current(),
            link_properties: self.ctx.link_properties(),
        }
    }

    /// Take every change recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }

    // ── Event entry point ────────────────────────────────────────────

    /// Process one event to completion.
    pub fn process(&mut self, event: Event) {
        trace!(event = event.name(), state = %self.leaf, "processing event");
        match event {
            Event::Command(CommandEnvelope {
                command,
                response_tx,
            }) => {
                let result = self.execute(&command);
                if let Some(tx) = response_tx {
                    // The caller may have stopped waiting.
                    let _ = tx.send(result);
                }
            }
            Event::Radio(radio) => self.deliver(Signal::Radio(&radio)),
            Event::Ip(ip) => self.on_ip_event(&ip),
            Event::Agent(agent) => self.on_agent_event(agent),
            Event::Timer(timer) => self.on_timer(timer),
            Event::Shutdown => self.shutdown(),
        }
    }

    /// Run a command through the hierarchy.
    pub fn execute(&mut self, command: &Command) -> Result<CommandResult, CoreError> {
        debug!(command = command.name(), state = %self.leaf, "command");
        let mut result = Err(CoreError::InvalidState {
            command: command.name().into(),
            state: self.leaf.to_string(),
        });
        for state in self.leaf.chain() {
            match self.command_in(state, command) {
                Ok(None) => {}
                Ok(Some(reply)) => {
                    result = Ok(reply);
                    break;
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.run_transitions();
        if let Err(ref err) = result {
            debug!(command = command.name(), error = %err, "command not accepted");
        }
        result
    }

    fn command_in(
        &mut self,
        state: StateId,
        command: &Command,
    ) -> Result<Option<CommandResult>, CoreError> {
        match state {
            StateId::Connectable => self.connectable_command(command),
            StateId::ConnectingOrConnected => self.connecting_or_connected_command(command),
            StateId::L2Connected => self.l2_connected_command(command),
            StateId::L3Connected => self.l3_connected_command(command),
            StateId::Disconnected => Ok(Self::disconnected_command(command)),
            StateId::L2Connecting
            | StateId::WaitBeforeL3Provisioning
            | StateId::L3Provisioning
            | StateId::Roaming => Ok(None),
        }
    }

    fn deliver(&mut self, signal: Signal<'_>) {
        let mut handled = false;
        for state in self.leaf.chain() {
            if self.signal_in(state, signal) == Disposition::Handled {
                handled = true;
                break;
            }
        }
        if !handled {
            debug!(event = signal.name(), state = %self.leaf, "event not handled");
        }
        self.run_transitions();
    }

    fn signal_in(&mut self, state: StateId, signal: Signal<'_>) -> Disposition {
        match state {
            StateId::Connectable => self.connectable_signal(signal),
            StateId::ConnectingOrConnected => Disposition::NotHandled,
            StateId::L2Connecting => self.l2_connecting_signal(signal),
            StateId::L2Connected => self.l2_connected_signal(signal),
            StateId::WaitBeforeL3Provisioning => self.wait_before_l3_signal(signal),
            StateId::L3Provisioning => self.l3_provisioning_signal(signal),
            StateId::L3Connected => self.l3_connected_signal(signal),
            StateId::Roaming => self.roaming_signal(signal),
            StateId::Disconnected => self.disconnected_signal(signal),
        }
    }

    // ── Central filtering ────────────────────────────────────────────

    fn on_ip_event(&mut self, event: &IpEvent) {
        let session = event.session;
        if self.ip.is_retiring(session) {
            if matches!(event.kind, IpEventKind::ShutdownComplete) {
                self.ip.on_shutdown_complete(
                    session,
                    self.services.ip.as_mut(),
                    self.timers.as_ref(),
                );
            } else {
                debug!(
                    %session,
                    event = event.kind.name(),
                    "dropping callback from retiring ip session"
                );
            }
            return;
        }
        if !self.ip.is_current(session) {
            warn!(
                %session,
                current = ?self.ip.current(),
                event = event.kind.name(),
                "dropping callback from unknown ip session"
            );
            return;
        }
        if !self.ip.accepts(&event.kind, event.run) {
            debug!(
                %session,
                run = ?event.run,
                current_run = ?self.ip.current_run(),
                event = event.kind.name(),
                "dropping result from a finished provisioning run"
            );
            return;
        }
        if matches!(event.kind, IpEventKind::Created) {
            self.ip.on_created(session, self.services.ip.as_mut());
        }
        self.deliver(Signal::Ip(&event.kind));
    }

    fn on_agent_event(&mut self, event: AgentEvent) {
        if self.ctx.agent != Some(event.agent) {
            debug!(agent = %event.agent, "dropping signal from stale network agent");
            return;
        }
        self.deliver(Signal::Agent(event.kind));
    }

    fn on_timer(&mut self, event: TimerEvent) {
        let TimerEvent { kind, generation } = event;
        let current = match kind {
            TimerKind::ConnectingWatchdog => self.ctx.connecting_watchdog.fire(generation),
            TimerKind::RoamWatchdog => self.ctx.roam_watchdog.fire(generation),
            TimerKind::RssiPoll => self.ctx.rssi_poll.fire(generation),
            TimerKind::IpClientStartup => self.ip.on_startup_timeout(
                generation,
                self.services.ip.as_mut(),
                self.timers.as_ref(),
            ),
            TimerKind::IpClientShutdown => {
                // Fully handled by the lifecycle; nothing for states to do.
                self.ip.on_shutdown_timeout(
                    generation,
                    self.services.ip.as_mut(),
                    self.timers.as_ref(),
                );
                return;
            }
        };
        if !current {
            debug!(timer = %kind, generation, "dropping stale timer");
            return;
        }
        debug!(timer = %kind, generation, state = %self.leaf, "timer fired");
        self.deliver(Signal::Timer(kind));
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Request a transition once the current handler returns. A request
    /// for the current leaf is a no-op; use `reenter` to restart it.
    pub(crate) fn transition_to(&mut self, target: LeafState) {
        self.pending = Some(Transition::To(target));
    }

    pub(crate) fn reenter(&mut self, target: LeafState) {
        self.pending = Some(Transition::Reenter(target));
    }

    fn run_transitions(&mut self) {
        // Entry actions may request another transition; bounded so a
        // handler bug cannot spin forever.
        for _ in 0..16 {
            let Some(transition) = self.pending.take() else {
                return;
            };
            let (target, reenter) = match transition {
                Transition::To(target) => (target, false),
                Transition::Reenter(target) => (target, true),
            };
            if target == self.leaf && !reenter {
                continue;
            }
            self.apply_transition(target);
        }
        warn!(state = %self.leaf, "transition loop did not settle");
        self.pending = None;
    }

    fn apply_transition(&mut self, target: LeafState) {
        let from = self.leaf;
        let pivot = if from == target {
            // Re-entry exits and enters only the leaf itself.
            target.id().parent()
        } else {
            Some(from.id().common_ancestor(target.id()))
        };

        for state in from.chain().take_while(|state| Some(*state) != pivot) {
            trace!(%state, "exit");
            self.exit(state);
        }

        let mut entering: Vec<StateId> = target
            .chain()
            .take_while(|state| Some(*state) != pivot)
            .collect();
        entering.reverse();

        debug!(from = %from, to = %target, "transition");
        self.leaf = target;
        self.detailed = target.detailed();
        self.record_change(from);

        for state in entering {
            trace!(%state, "enter");
            self.enter(state);
        }
    }

    fn enter(&mut self, state: StateId) {
        match state {
            StateId::L2Connecting => self.enter_l2_connecting(),
            StateId::L2Connected => self.enter_l2_connected(),
            StateId::WaitBeforeL3Provisioning => self.enter_wait_before_l3(),
            StateId::L3Provisioning => self.enter_l3_provisioning(),
            StateId::L3Connected => self.enter_l3_connected(),
            StateId::Roaming => self.enter_roaming(),
            StateId::Connectable | StateId::ConnectingOrConnected | StateId::Disconnected => {}
        }
    }

    fn exit(&mut self, state: StateId) {
        match state {
            StateId::L2Connecting => self.ctx.connecting_watchdog.cancel(),
            StateId::L2Connected => self.exit_l2_connected(),
            StateId::Roaming => self.exit_roaming(),
            StateId::Connectable
            | StateId::ConnectingOrConnected
            | StateId::WaitBeforeL3Provisioning
            | StateId::L3Provisioning
            | StateId::L3Connected
            | StateId::Disconnected => {}
        }
    }

    // ── Observation helpers ──────────────────────────────────────────

    pub(crate) fn set_detailed(&mut self, detailed: DetailedState) {
        if self.detailed == detailed {
            return;
        }
        self.detailed = detailed;
        self.record_change(self.leaf);
    }

    fn record_change(&mut self, previous: LeafState) {
        self.sequence += 1;
        self.changes.push(StateChange {
            sequence: self.sequence,
            at: Utc::now(),
            previous,
            state: self.leaf,
            detailed: self.detailed,
            network_id: self.ctx.target_network_id.or(self.ctx.last_network_id),
        });
    }
}
