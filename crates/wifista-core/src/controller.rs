// ── Station runtime ──
//
// Owns the state machine on a dedicated task and feeds it from one
// unbounded queue. Collaborators post radio, IP and agent callbacks
// through the `EventSink`; callers issue commands and observe the
// station through a watch channel (latest snapshot) and a broadcast
// channel (every change, in order).

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandResult};
use crate::config::ClientModeConfig;
use crate::error::CoreError;
use crate::event::{Event, EventSink};
use crate::machine::{StateChange, StateMachine, StationSnapshot};
use crate::service::Collaborators;
use crate::stream::{SnapshotStream, StateChangeStream};
use crate::watchdog::TokioTimers;

const CHANGE_CHANNEL_SIZE: usize = 256;

// ── StationController ────────────────────────────────────────────────

/// Handle to a running station.
///
/// Cheaply cloneable via `Arc<StationInner>`. Dropping every handle does
/// not stop the station; call [`shutdown()`](Self::shutdown).
#[derive(Clone)]
pub struct StationController {
    inner: Arc<StationInner>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

struct StationInner {
    interface: String,
    sink: EventSink,
    snapshot: watch::Sender<StationSnapshot>,
    changes: broadcast::Sender<Arc<StateChange>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for StationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationController")
            .field("interface", &self.inner.interface)
            .finish_non_exhaustive()
    }
}

impl StationController {
    /// Build the state machine and start its event loop. Must be called
    /// from within a Tokio runtime.
    pub fn start(
        config: ClientModeConfig,
        services: Collaborators,
    ) -> Result<Self, CoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let cancel = CancellationToken::new();
        let timers = TokioTimers::new(sink.clone(), cancel.child_token());

        let interface = config.interface_name.clone();
        let machine = StateMachine::new(config, services, Box::new(timers))?;
        let (snapshot, _) = watch::channel(machine.snapshot());
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);

        let inner = Arc::new(StationInner {
            interface,
            sink,
            snapshot,
            changes,
            cancel,
        });

        let handle = tokio::spawn(event_loop(Arc::clone(&inner), machine, rx));
        info!(interface = %inner.interface, "station started");
        Ok(Self {
            inner,
            task: Arc::new(Mutex::new(Some(handle))),
        })
    }

    pub fn interface(&self) -> &str {
        &self.inner.interface
    }

    /// Handle for collaborators to post their callbacks.
    pub fn event_sink(&self) -> EventSink {
        self.inner.sink.clone()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Queue a command behind everything already posted and wait for
    /// the machine to process it.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::StationStopped);
        }
        let rx = self.inner.sink.command(command)?;
        rx.await.map_err(|_| CoreError::StationStopped)?
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Latest published snapshot.
    pub fn snapshot(&self) -> StationSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn watch(&self) -> watch::Receiver<StationSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Snapshot updates as a `Stream`, starting with the current one.
    pub fn snapshots(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }

    /// Every state change from now on, in order.
    pub fn changes(&self) -> StateChangeStream {
        StateChangeStream::new(self.inner.changes.subscribe())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Tear the link down, release the IP session and stop the loop.
    /// Events already queued are processed first.
    pub async fn shutdown(&self) {
        let handle = self.task.lock().await.take();
        let Some(handle) = handle else {
            debug!("station already stopped");
            return;
        };
        // A sentinel at the back of the queue: everything posted before
        // it is processed, then the loop tears down and exits.
        if self.inner.sink.post(Event::Shutdown).is_err() {
            self.inner.cancel.cancel();
        }
        if let Err(e) = handle.await {
            warn!(error = %e, "station task ended abnormally");
        }
        self.inner.cancel.cancel();
        info!(interface = %self.inner.interface, "station stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }
}

// ── Event loop ───────────────────────────────────────────────────────

async fn event_loop(
    inner: Arc<StationInner>,
    mut machine: StateMachine,
    mut rx: mpsc::UnboundedReceiver<Event>,
) {
    let cancel = inner.cancel.clone();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                let stop = matches!(event, Event::Shutdown);
                machine.process(event);
                publish(&inner, &mut machine);
                if stop {
                    break;
                }
            }
        }
    }
    rx.close();
    debug!(interface = %inner.interface, "station event loop exited");
}

fn publish(inner: &StationInner, machine: &mut StateMachine) {
    for change in machine.drain_changes() {
        // No subscribers is fine.
        let _ = inner.changes.send(Arc::new(change));
    }
    let next = machine.snapshot();
    inner.snapshot.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
