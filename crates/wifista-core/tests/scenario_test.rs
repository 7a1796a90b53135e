// Scenario runner tests: bundled scenarios, traces and custom YAML.

#![allow(clippy::unwrap_used)]

use std::fmt::Write as _;

use pretty_assertions::assert_eq;

use wifista_core::sim::{
    Call, Scenario, ScenarioError, SimNetwork, Trace, run_scenario, run_scenario_with_fallback,
};
use wifista_core::{
    AttemptOutcome, BlockReason, ClientModeConfig, DisableReason, LeafState, MacAddress,
    NetworkConfigStore, NetworkId, NetworkIdentity, Ssid,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn render(trace: &Trace) -> String {
    let mut out = String::new();
    for t in &trace.transitions {
        writeln!(out, "{} {} -> {} [{}]", t.step, t.from, t.to, t.detailed).unwrap();
    }
    for c in &trace.commands {
        writeln!(out, "{} {}: {}", c.step, c.command, c.result).unwrap();
    }
    out
}

fn run(yaml: &str) -> Result<Trace, ScenarioError> {
    let scenario = Scenario::from_yaml(yaml)?;
    run_scenario(&scenario, &ClientModeConfig::default())
}

/// Store standing in for a saved-network file.
struct LabStore;

impl NetworkConfigStore for LabStore {
    fn identity(&self, network_id: NetworkId) -> Option<NetworkIdentity> {
        (network_id == NetworkId(9)).then(|| SimNetwork::open(9, "lab").identity())
    }

    fn record_failure(&mut self, _network_id: NetworkId, _reason: DisableReason) {}

    fn record_connected(&mut self, _network_id: NetworkId) {}

    fn record_validation(&mut self, _network_id: NetworkId, _valid: bool) {}
}

// ── Bundled scenarios ───────────────────────────────────────────────

#[test]
fn test_builtin_names_are_stable() {
    let names: Vec<_> = Scenario::builtin_names().collect();
    assert_eq!(
        names,
        vec![
            "round-trip",
            "superseding",
            "ap-busy",
            "dhcp-failure",
            "roam",
            "roam-timeout",
            "reprovision",
        ]
    );
}

#[test]
fn test_round_trip_transitions() {
    let scenario = Scenario::builtin("round-trip").unwrap();
    let trace = run_scenario(&scenario, &ClientModeConfig::default()).unwrap();

    insta::assert_snapshot!(render(&trace), @r"
    2 disconnected -> l2-connecting [connecting]
    4 l2-connecting -> l2-connecting [authenticating]
    6 l2-connecting -> l3-provisioning [obtaining-ip-addr]
    9 l3-provisioning -> l3-connected [connected]
    14 l3-connected -> disconnected [disconnected]
    2 start-connect: attempt-started #1
    14 disconnect: ok
    ");
    assert_eq!(trace.final_state.state, LeafState::Disconnected);
    assert_eq!(trace.final_state.last_network_id, None);
}

#[test]
fn test_trace_serializes_calls_by_tag() {
    let scenario = Scenario::builtin("round-trip").unwrap();
    let trace = run_scenario(&scenario, &ClientModeConfig::default()).unwrap();
    let value = serde_json::to_value(&trace).unwrap();

    assert_eq!(value["scenario"], "round-trip");
    assert_eq!(value["calls"][0]["call"], "ip-create");
    assert_eq!(value["calls"][0]["session"], 1);
    assert_eq!(value["final_state"]["state"], "disconnected");

    let connects: Vec<_> = value["calls"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|call| call["call"] == "radio-connect")
        .collect();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0]["network_id"], 5);
    assert_eq!(connects[0]["bssid"], "any");
}

#[test]
fn test_roam_keeps_the_agent_registered() {
    let scenario = Scenario::builtin("roam").unwrap();
    let trace = run_scenario(&scenario, &ClientModeConfig::default()).unwrap();
    let states: Vec<_> = trace
        .transitions
        .iter()
        .filter(|t| t.from != t.to)
        .map(|t| t.to)
        .collect();
    assert_eq!(
        states,
        vec![
            LeafState::L2Connecting,
            LeafState::L3Provisioning,
            LeafState::L3Connected,
            LeafState::Roaming,
            LeafState::L3Connected,
        ]
    );
    let registrations = trace
        .calls
        .iter()
        .filter(|call| serde_json::to_value(call).unwrap()["call"] == "agent-register")
        .count();
    assert_eq!(registrations, 1);
}

// ── Custom scenarios ────────────────────────────────────────────────

#[test]
fn test_wrong_password_is_reported_and_counted() {
    let trace = run(r#"
name: wrong-password
networks:
  - id: 3
    ssid: cafe
    security: psk
    passphrase: hunter22
steps:
  - ip: created
  - command:
      start-connect:
        network_id: 3
  - radio:
      authentication-failure:
        ssid: cafe
        bssid: "aa:bb:cc:00:00:03"
        reason: wrong-password
  - expect-state: disconnected
  - expect-outcome:
      authentication-failure: wrong-password
"#)
    .unwrap();
    let value = serde_json::to_value(&trace.calls).unwrap();
    let kinds: Vec<_> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|call| call["call"].as_str().unwrap().to_owned())
        .collect();
    assert!(kinds.contains(&"block-bssid".to_owned()), "{kinds:?}");
    assert!(kinds.contains(&"record-failure".to_owned()), "{kinds:?}");
}

#[test]
fn test_ap_busy_blocks_the_bss_for_five_minutes() {
    let scenario = Scenario::builtin("ap-busy").unwrap();
    let trace = run_scenario(&scenario, &ClientModeConfig::default()).unwrap();

    let blocks: Vec<_> = trace
        .calls
        .iter()
        .filter(|call| matches!(call, Call::BlockBssid { .. }))
        .collect();
    assert_eq!(
        blocks,
        vec![&Call::BlockBssid {
            ssid: Ssid::new("home"),
            bssid: MacAddress::new("aa:bb:cc:00:00:01").unwrap(),
            reason: BlockReason::ApUnableToHandleNewSta,
            secs: Some(300),
        }]
    );
    assert_eq!(trace.final_state.state, LeafState::Disconnected);
}

#[test]
fn test_fast_connect_override() {
    let trace = run(r"
name: fast
fast_connect: true
networks:
  - id: 5
    ssid: home
steps:
  - ip: created
  - command:
      start-connect:
        network_id: 5
  - radio:
      network-connected:
        network_id: 5
        ssid: home
        bssid: 'aa:bb:cc:00:00:01'
  - ip:
      provisioning-success:
        addresses:
          - address: 10.0.0.2
            prefix_len: 8
        dns_servers:
          - 10.0.0.1
  - expect-state: l3-connected
")
    .unwrap();
    let modes: Vec<_> = serde_json::to_value(&trace.calls)
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .filter(|call| call["call"] == "ip-start-provisioning")
        .map(|call| call["mode"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(modes, vec!["fast-connect"]);
}

#[test]
fn test_unknown_scenario_keys_are_rejected() {
    let err = run(r"
name: typo
fast-connect: true
steps:
  - expect-state: disconnected
")
    .unwrap_err();
    assert!(matches!(err, ScenarioError::Parse(_)));
}

#[test]
fn test_failed_expectation_stops_the_run() {
    let err = run(r"
name: impatient
networks:
  - id: 5
    ssid: home
steps:
  - ip: created
  - command:
      start-connect:
        network_id: 5
  - expect-state: l3-connected
")
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "step 3: expected L3Connected, found L2Connecting"
    );
}

#[test]
fn test_unknown_network_command_is_traced_as_error() {
    let trace = run(r"
name: missing
steps:
  - command:
      start-connect:
        network_id: 42
  - expect-state: disconnected
  - expect-reports: 0
")
    .unwrap();
    assert_eq!(trace.commands.len(), 1);
    assert!(
        trace.commands[0].result.starts_with("error: "),
        "{}",
        trace.commands[0].result
    );
}

#[test]
fn test_fallback_store_supplies_unlisted_networks() {
    let scenario = Scenario::from_yaml(
        r"
name: fallback
steps:
  - ip: created
  - command:
      start-connect:
        network_id: 9
  - expect-state: l2-connecting
  - radio:
      network-not-found:
        ssid: lab
  - radio:
      network-not-found:
        ssid: lab
  - radio:
      network-not-found:
        ssid: lab
  - expect-state: disconnected
  - expect-outcome: network-not-found
",
    )
    .unwrap();
    let trace =
        run_scenario_with_fallback(&scenario, &ClientModeConfig::default(), Box::new(LabStore))
            .unwrap();
    assert_eq!(trace.final_state.state, LeafState::Disconnected);

    // Without the fallback the connect is refused outright.
    let err = run_scenario(&scenario, &ClientModeConfig::default()).unwrap_err();
    assert!(err.to_string().starts_with("step 3:"), "{err}");
}

#[test]
fn test_outcomes_parse_from_yaml() {
    let outcome: AttemptOutcome = serde_yaml::from_str("association-rejected: ap-busy").unwrap();
    assert_eq!(outcome.to_string(), "association-rejected(ap-busy)");
    let outcome: AttemptOutcome = serde_yaml::from_str("roam-timeout").unwrap();
    assert_eq!(outcome, AttemptOutcome::RoamTimeout);
}
