// ── Watchdog timers ──
//
// A watchdog is a (duration, generation) pair. Arming bumps the
// generation and schedules a timer event carrying it; cancelling bumps
// the generation again so any event already in flight no longer
// matches. Timers are never aborted: a stale firing is simply inert.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::event::{EventSink, TimerEvent, TimerKind};

/// Schedules delayed timer events into the station's queue.
pub trait TimerService: Send {
    fn schedule(&self, after: Duration, event: TimerEvent);
}

/// Generation-tagged timeout scoped to one sub-state.
#[derive(Debug, Clone)]
pub struct Watchdog {
    kind: TimerKind,
    duration: Duration,
    generation: u64,
    armed: bool,
}

impl Watchdog {
    pub fn new(kind: TimerKind, duration: Duration) -> Self {
        Self {
            kind,
            duration,
            generation: 0,
            armed: false,
        }
    }

    /// Start (or restart) the watchdog. Returns the new generation.
    pub fn arm(&mut self, timers: &dyn TimerService) -> u64 {
        self.generation += 1;
        self.armed = true;
        timers.schedule(
            self.duration,
            TimerEvent {
                kind: self.kind,
                generation: self.generation,
            },
        );
        trace!(timer = %self.kind, generation = self.generation, "watchdog armed");
        self.generation
    }

    /// Invalidate whatever is in flight. Safe to call when not armed.
    pub fn cancel(&mut self) {
        if self.armed {
            self.generation += 1;
            self.armed = false;
            trace!(timer = %self.kind, generation = self.generation, "watchdog cancelled");
        }
    }

    /// Does a fired event with this generation still mean something?
    pub fn is_current(&self, generation: u64) -> bool {
        self.armed && self.generation == generation
    }

    /// Consume a matching firing. Returns `false` for stale events.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.armed = false;
            true
        } else {
            false
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

// ── Tokio-backed timers ──────────────────────────────────────────────

/// Real timers: one sleeping task per scheduled event, all children of a
/// cancellation token owned by the station runtime.
pub struct TokioTimers {
    sink: EventSink,
    cancel: CancellationToken,
}

impl TokioTimers {
    pub fn new(sink: EventSink, cancel: CancellationToken) -> Self {
        Self { sink, cancel }
    }
}

impl TimerService for TokioTimers {
    fn schedule(&self, after: Duration, event: TimerEvent) {
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(after) => {
                    // The queue may already be closed during shutdown.
                    let _ = sink.timer(event);
                }
            }
        });
    }
}
