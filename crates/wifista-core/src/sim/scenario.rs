// ── Scenario runner ──
//
// A scenario is a YAML list of steps: commands, injected collaborator
// callbacks, clock advances and expectations. The harness feeds them
// to a real `StateMachine` wired to simulated collaborators and
// collects a `Trace` of everything that happened.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{
    Call, Journal, ManualTimers, SimBlocklist, SimIpProvisioner, SimNetwork, SimNetworkStore,
    SimPresenter, SimRadio, SimSelection,
};
use crate::command::{Command, CommandResult};
use crate::config::{ClientModeConfig, ReachabilityPolicy};
use crate::error::CoreError;
use crate::event::{AgentEvent, AgentEventKind, Event, IpEvent, IpEventKind, RadioEvent};
use crate::ip::{ProvisioningRun, SessionToken};
use crate::machine::{LeafState, StateMachine, StationSnapshot};
use crate::model::{AttemptOutcome, DetailedState, NetworkId};
use crate::service::{AgentToken, Collaborators, NetworkConfigStore, SignalPoll};

const BUILTIN: &[(&str, &str)] = &[
    ("round-trip", include_str!("../../scenarios/round-trip.yaml")),
    ("superseding", include_str!("../../scenarios/superseding.yaml")),
    ("ap-busy", include_str!("../../scenarios/ap-busy.yaml")),
    ("dhcp-failure", include_str!("../../scenarios/dhcp-failure.yaml")),
    ("roam", include_str!("../../scenarios/roam.yaml")),
    ("roam-timeout", include_str!("../../scenarios/roam-timeout.yaml")),
    ("reprovision", include_str!("../../scenarios/reprovision.yaml")),
];

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown scenario {name:?}")]
    Unknown { name: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("step {step}: no {which} ip session")]
    NoSession { step: usize, which: &'static str },

    #[error("step {step}: no network agent is registered")]
    NoAgent { step: usize },

    #[error("step {step}: expected {expected}, found {actual}")]
    Expectation {
        step: usize,
        expected: String,
        actual: String,
    },
}

// ── Scenario ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Overrides the reachability policy of the base configuration.
    #[serde(default)]
    pub policy: Option<ReachabilityPolicy>,
    /// Overrides pre-association provisioning.
    #[serde(default)]
    pub fast_connect: Option<bool>,
    #[serde(default)]
    pub networks: Vec<SimNetwork>,
    pub steps: Vec<Step>,
}

/// One line of a scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Command(Command),
    Radio(RadioEvent),
    /// Callback from the current IP session, tagged with the live
    /// provisioning run.
    Ip(IpEventKind),
    /// Callback from the session that is shutting down.
    IpRetiring(IpEventKind),
    /// Callback from an explicit session, current or not.
    IpSession {
        session: SessionToken,
        #[serde(default)]
        run: Option<ProvisioningRun>,
        event: IpEventKind,
    },
    /// Signal from the registered network agent.
    Agent(AgentEventKind),
    /// Signal from an explicit agent registration.
    AgentSession {
        agent: AgentToken,
        event: AgentEventKind,
    },
    Advance {
        #[serde(default)]
        secs: u64,
        #[serde(default)]
        millis: u64,
    },
    /// Make the next radio connect or roam request fail.
    RefuseConnect(String),
    /// Reading returned by the following signal polls.
    Signal(SignalPoll),
    ExpectState(LeafState),
    ExpectDetailed(DetailedState),
    /// Outcome of the most recently reported attempt.
    ExpectOutcome(AttemptOutcome),
    /// Number of attempt reports so far.
    ExpectReports(usize),
    ExpectLastNetwork(Option<NetworkId>),
    /// The state was never entered by a transition so far.
    ExpectNotVisited(LeafState),
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Names of the scenarios bundled with the crate.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(name, _)| *name)
    }

    pub fn builtin(name: &str) -> Result<Self, ScenarioError> {
        let (_, text) = BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .ok_or_else(|| ScenarioError::Unknown { name: name.into() })?;
        Self::from_yaml(text)
    }

    pub fn builtins() -> Result<Vec<Self>, ScenarioError> {
        Self::builtin_names().map(Self::builtin).collect()
    }

    /// The base configuration with this scenario's overrides applied.
    pub fn configure(&self, base: &ClientModeConfig) -> ClientModeConfig {
        let mut config = base.clone();
        if let Some(policy) = self.policy {
            config.reachability_policy = policy;
        }
        if let Some(fast_connect) = self.fast_connect {
            config.pre_association_provisioning = fast_connect;
        }
        config
    }
}

// ── Trace ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceTransition {
    pub step: usize,
    pub from: LeafState,
    pub to: LeafState,
    pub detailed: DetailedState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceCommand {
    pub step: usize,
    pub command: &'static str,
    pub result: String,
}

/// Everything observable about one scenario run. Free of timestamps so
/// it can be compared or snapshotted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub scenario: String,
    pub transitions: Vec<TraceTransition>,
    pub commands: Vec<TraceCommand>,
    pub calls: Vec<Call>,
    pub final_state: StationSnapshot,
}

// ── Harness ──────────────────────────────────────────────────────────

/// A state machine wired to simulated collaborators and a manual clock.
#[derive(Debug)]
pub struct Harness {
    machine: StateMachine,
    journal: Journal,
    radio: SimRadio,
    timers: ManualTimers,
    transitions: Vec<TraceTransition>,
    commands: Vec<TraceCommand>,
    step: usize,
}

impl Harness {
    pub fn new(config: ClientModeConfig, networks: Vec<SimNetwork>) -> Result<Self, CoreError> {
        Self::build(config, networks, None)
    }

    /// Like [`new`](Self::new), but networks the scenario does not
    /// define are looked up in `fallback`.
    pub fn with_fallback(
        config: ClientModeConfig,
        networks: Vec<SimNetwork>,
        fallback: Box<dyn NetworkConfigStore>,
    ) -> Result<Self, CoreError> {
        Self::build(config, networks, Some(fallback))
    }

    fn build(
        config: ClientModeConfig,
        networks: Vec<SimNetwork>,
        fallback: Option<Box<dyn NetworkConfigStore>>,
    ) -> Result<Self, CoreError> {
        let journal = Journal::new();
        let radio = SimRadio::new(journal.clone());
        let timers = ManualTimers::new();
        let mut store = SimNetworkStore::new(journal.clone(), networks);
        if let Some(fallback) = fallback {
            store = store.with_fallback(fallback);
        }
        let services = Collaborators {
            radio: Box::new(radio.clone()),
            ip: Box::new(SimIpProvisioner::new(journal.clone())),
            presenter: Box::new(SimPresenter::new(journal.clone())),
            selection: Box::new(SimSelection::new(journal.clone())),
            blocklist: Box::new(SimBlocklist::new(journal.clone())),
            networks: Box::new(store),
        };
        let mut machine = StateMachine::new(config, services, Box::new(timers.clone()))?;
        machine.drain_changes();
        Ok(Self {
            machine,
            journal,
            radio,
            timers,
            transitions: Vec::new(),
            commands: Vec::new(),
            step: 0,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    #[cfg(test)]
    pub(crate) fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn radio(&self) -> &SimRadio {
        &self.radio
    }

    pub fn timers(&self) -> &ManualTimers {
        &self.timers
    }

    pub fn state(&self) -> LeafState {
        self.machine.state()
    }

    pub fn transitions(&self) -> &[TraceTransition] {
        &self.transitions
    }

    // ── Driving ──────────────────────────────────────────────────────

    pub fn execute(&mut self, command: &Command) -> Result<CommandResult, CoreError> {
        let result = self.machine.execute(command);
        self.collect();
        result
    }

    pub fn radio_event(&mut self, event: RadioEvent) {
        self.process(Event::Radio(event));
    }

    /// Deliver a callback from the current IP session. Provisioning
    /// results are tagged with the live run.
    pub fn ip(&mut self, kind: IpEventKind) -> Result<(), ScenarioError> {
        let lifecycle = self.machine.ip_lifecycle();
        let session = lifecycle.current().ok_or(ScenarioError::NoSession {
            step: self.step,
            which: "current",
        })?;
        let run = lifecycle.current_run();
        self.ip_run(session, run, kind);
        Ok(())
    }

    /// Deliver an untagged callback from any session.
    pub fn ip_session(&mut self, session: SessionToken, kind: IpEventKind) {
        self.ip_run(session, None, kind);
    }

    pub fn ip_run(
        &mut self,
        session: SessionToken,
        run: Option<ProvisioningRun>,
        kind: IpEventKind,
    ) {
        self.process(Event::Ip(IpEvent { session, run, kind }));
    }

    /// Deliver a signal from the registered network agent.
    pub fn agent(&mut self, kind: AgentEventKind) -> Result<(), ScenarioError> {
        let agent = self
            .machine
            .context()
            .agent()
            .ok_or(ScenarioError::NoAgent { step: self.step })?;
        self.process(Event::Agent(AgentEvent { agent, kind }));
        Ok(())
    }

    /// Move the clock forward, firing every timer that falls due on the
    /// way in deadline order.
    pub fn advance(&mut self, by: Duration) {
        let until = self.timers.now() + by;
        while let Some(event) = self.timers.pop_due(until) {
            self.process(Event::Timer(event));
        }
        self.timers.set_now(until);
    }

    pub fn process(&mut self, event: Event) {
        self.machine.process(event);
        self.collect();
    }

    fn collect(&mut self) {
        let step = self.step;
        self.transitions
            .extend(self.machine.drain_changes().into_iter().map(|change| {
                TraceTransition {
                    step,
                    from: change.previous,
                    to: change.state,
                    detailed: change.detailed,
                }
            }));
    }

    /// Run one scenario step.
    pub fn run_step(&mut self, step: &Step) -> Result<(), ScenarioError> {
        self.step += 1;
        let index = self.step;
        debug!(index, ?step, "scenario step");
        match step {
            Step::Command(command) => {
                let result = match self.execute(command) {
                    Ok(CommandResult::Ok) => "ok".to_owned(),
                    Ok(CommandResult::Ignored) => "ignored".to_owned(),
                    Ok(CommandResult::AttemptStarted { attempt_id }) => {
                        format!("attempt-started #{attempt_id}")
                    }
                    Err(e) => format!("error: {e}"),
                };
                self.commands.push(TraceCommand {
                    step: index,
                    command: command.name(),
                    result,
                });
            }
            Step::Radio(event) => self.radio_event(event.clone()),
            Step::Ip(kind) => self.ip(kind.clone())?,
            Step::IpRetiring(kind) => {
                let session = self.machine.ip_lifecycle().retiring().ok_or(
                    ScenarioError::NoSession {
                        step: index,
                        which: "retiring",
                    },
                )?;
                self.ip_session(session, kind.clone());
            }
            Step::IpSession {
                session,
                run,
                event,
            } => self.ip_run(*session, *run, event.clone()),
            Step::Agent(kind) => self.agent(*kind)?,
            Step::AgentSession { agent, event } => self.process(Event::Agent(AgentEvent {
                agent: *agent,
                kind: *event,
            })),
            Step::Advance { secs, millis } => {
                self.advance(Duration::from_secs(*secs) + Duration::from_millis(*millis));
            }
            Step::RefuseConnect(message) => self.radio.refuse_next(message.clone()),
            Step::Signal(poll) => self.radio.set_signal(*poll),
            Step::ExpectState(expected) => {
                expect(index, expected, &self.machine.state())?;
            }
            Step::ExpectDetailed(expected) => {
                expect(index, expected, &self.machine.detailed_state())?;
            }
            Step::ExpectOutcome(expected) => {
                let actual = self.journal.outcomes().last().copied();
                expect(index, &Some(*expected), &actual)?;
            }
            Step::ExpectReports(expected) => {
                expect(index, expected, &self.journal.outcomes().len())?;
            }
            Step::ExpectLastNetwork(expected) => {
                expect(index, expected, &self.machine.context().last_network_id())?;
            }
            Step::ExpectNotVisited(state) => {
                if let Some(hit) = self
                    .transitions
                    .iter()
                    .find(|t| t.to == *state && t.from != t.to)
                {
                    return Err(ScenarioError::Expectation {
                        step: index,
                        expected: format!("{state} never entered"),
                        actual: format!("entered at step {}", hit.step),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn into_trace(self, scenario: &str) -> Trace {
        Trace {
            scenario: scenario.to_owned(),
            transitions: self.transitions,
            commands: self.commands,
            calls: self.journal.calls(),
            final_state: self.machine.snapshot(),
        }
    }
}

fn expect<T: PartialEq + std::fmt::Debug>(
    step: usize,
    expected: &T,
    actual: &T,
) -> Result<(), ScenarioError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ScenarioError::Expectation {
            step,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        })
    }
}

/// Run a scenario from start to finish against `base` (with the
/// scenario's overrides applied).
pub fn run_scenario(scenario: &Scenario, base: &ClientModeConfig) -> Result<Trace, ScenarioError> {
    let harness = Harness::new(scenario.configure(base), scenario.networks.clone())?;
    run_in(harness, scenario)
}

/// [`run_scenario`] with a fallback store for networks the scenario
/// does not define.
pub fn run_scenario_with_fallback(
    scenario: &Scenario,
    base: &ClientModeConfig,
    fallback: Box<dyn NetworkConfigStore>,
) -> Result<Trace, ScenarioError> {
    let harness = Harness::with_fallback(
        scenario.configure(base),
        scenario.networks.clone(),
        fallback,
    )?;
    run_in(harness, scenario)
}

fn run_in(mut harness: Harness, scenario: &Scenario) -> Result<Trace, ScenarioError> {
    info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
    for step in &scenario.steps {
        harness.run_step(step)?;
    }
    Ok(harness.into_trace(&scenario.name))
}
