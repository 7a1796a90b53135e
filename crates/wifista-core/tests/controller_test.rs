// Runtime tests for `StationController` on a paused Tokio clock.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;

use wifista_core::sim::{
    Call, Journal, SimBlocklist, SimIpProvisioner, SimNetwork, SimNetworkStore, SimPresenter,
    SimRadio, SimSelection,
};
use wifista_core::{
    AttemptOutcome, Bssid, ClientModeConfig, Collaborators, Command, CommandResult, CoreError,
    DisconnectReason, IpEventKind, LeafState, LinkAddress, LinkPropertiesSnapshot, MacAddress,
    NetworkId, ProvisioningRun, RadioEvent, Requester, SessionToken, Ssid, StationController,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn start() -> (StationController, Journal) {
    let journal = Journal::new();
    let services = Collaborators {
        radio: Box::new(SimRadio::new(journal.clone())),
        ip: Box::new(SimIpProvisioner::new(journal.clone())),
        presenter: Box::new(SimPresenter::new(journal.clone())),
        selection: Box::new(SimSelection::new(journal.clone())),
        blocklist: Box::new(SimBlocklist::new(journal.clone())),
        networks: Box::new(SimNetworkStore::new(
            journal.clone(),
            [SimNetwork::open(5, "home")],
        )),
    };
    let station = StationController::start(ClientModeConfig::default(), services).unwrap();
    (station, journal)
}

fn connect_home() -> Command {
    Command::StartConnect {
        network_id: NetworkId(5),
        requester: Requester::system(),
        bssid: Bssid::Any,
    }
}

fn associated() -> RadioEvent {
    RadioEvent::NetworkConnected {
        network_id: NetworkId(5),
        ssid: Ssid::new("home"),
        bssid: MacAddress::new("aa:bb:cc:00:00:01").unwrap(),
    }
}

fn leased() -> LinkPropertiesSnapshot {
    LinkPropertiesSnapshot {
        addresses: vec![LinkAddress {
            address: "192.168.1.20".parse().unwrap(),
            prefix_len: 24,
        }],
        dns_servers: vec!["192.168.1.1".parse().unwrap()],
        ..LinkPropertiesSnapshot::default()
    }
}

/// Bring network 5 all the way up through the event sink.
async fn bring_up(station: &StationController) {
    let sink = station.event_sink();
    sink.ip(SessionToken(1), IpEventKind::Created).unwrap();
    station.execute(connect_home()).await.unwrap();
    sink.radio(associated()).unwrap();
    sink.provisioning(
        SessionToken(1),
        ProvisioningRun(1),
        IpEventKind::ProvisioningSuccess(leased()),
    )
    .unwrap();

    let mut watch = station.watch();
    watch
        .wait_for(|snapshot| snapshot.state == LeafState::L3Connected)
        .await
        .unwrap();
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_execute_returns_the_command_result() {
    let (station, _journal) = start();
    assert_eq!(station.interface(), "wlan0");

    let result = station.execute(connect_home()).await.unwrap();
    assert_eq!(result, CommandResult::AttemptStarted { attempt_id: 1 });
    assert_eq!(station.snapshot().state, LeafState::L2Connecting);
    assert_eq!(station.snapshot().target_network_id, Some(NetworkId(5)));

    let err = station
        .execute(Command::StartConnect {
            network_id: NetworkId(77),
            requester: Requester::system(),
            bssid: Bssid::Any,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NetworkNotFound { .. }));

    station.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connecting_watchdog_fires_on_the_tokio_clock() {
    let (station, journal) = start();
    station
        .event_sink()
        .ip(SessionToken(1), IpEventKind::Created)
        .unwrap();
    station.execute(connect_home()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(station.snapshot().state, LeafState::L2Connecting);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(station.snapshot().state, LeafState::Disconnected);
    assert_eq!(journal.outcomes(), vec![AttemptOutcome::NetworkNotFound]);

    station.shutdown().await;
}

// ── Observation ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_changes_stream_sees_every_transition_in_order() {
    let (station, _journal) = start();
    let mut changes = station.changes();

    bring_up(&station).await;

    let mut states = Vec::new();
    while let Some(change) = changes.next().await {
        if change.previous != change.state {
            states.push(change.state);
        }
        if change.state == LeafState::L3Connected {
            break;
        }
    }
    assert_eq!(
        states,
        vec![
            LeafState::L2Connecting,
            LeafState::L3Provisioning,
            LeafState::L3Connected
        ]
    );

    station.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_stream_starts_with_the_current_state() {
    let (station, _journal) = start();
    let mut snapshots = station.snapshots();
    let first = snapshots.next().await.unwrap();
    assert_eq!(first.state, LeafState::Disconnected);
    assert_eq!(first.ip_session, Some(SessionToken(1)));

    station.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_session_callbacks_do_not_move_the_station() {
    let (station, _journal) = start();
    let sink = station.event_sink();
    sink.ip(SessionToken(1), IpEventKind::Created).unwrap();
    station.execute(connect_home()).await.unwrap();
    sink.radio(associated()).unwrap();
    sink.provisioning(
        SessionToken(8),
        ProvisioningRun(1),
        IpEventKind::ProvisioningSuccess(leased()),
    )
    .unwrap();
    // Right session, but untagged or from a run that was never started.
    sink.ip(SessionToken(1), IpEventKind::ProvisioningSuccess(leased()))
        .unwrap();
    sink.provisioning(
        SessionToken(1),
        ProvisioningRun(2),
        IpEventKind::ProvisioningSuccess(leased()),
    )
    .unwrap();

    // Commands queue behind events, so this observes every callback.
    station.execute(Command::Reassociate).await.unwrap();
    assert_eq!(station.snapshot().state, LeafState::L3Provisioning);

    station.shutdown().await;
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_down_and_stops() {
    let (station, journal) = start();
    bring_up(&station).await;
    assert!(station.is_running());

    station.shutdown().await;
    assert!(!station.is_running());
    assert_eq!(station.snapshot().state, LeafState::Disconnected);
    assert_eq!(
        journal.calls().last().cloned(),
        Some(Call::IpShutdown {
            session: SessionToken(1)
        })
    );

    let err = station
        .execute(Command::Disconnect {
            reason: DisconnectReason::User,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StationStopped));
    assert!(station.event_sink().is_closed());

    // A second shutdown is a no-op.
    station.shutdown().await;
}
