// ── Manual clock ──

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::event::TimerEvent;
use crate::watchdog::TimerService;

#[derive(Debug, Default)]
struct Queue {
    now: Duration,
    next_seq: u64,
    /// (due, insertion order, event)
    pending: Vec<(Duration, u64, TimerEvent)>,
}

/// Timer service driven by an explicit clock. Nothing fires until the
/// owner advances time; clones share one queue.
#[derive(Debug, Clone, Default)]
pub struct ManualTimers {
    queue: Arc<Mutex<Queue>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.queue().now
    }

    /// Number of scheduled events that have not fired yet, stale or not.
    pub fn pending(&self) -> usize {
        self.queue().pending.len()
    }

    /// Remove and return the earliest event due at or before `until`,
    /// moving the clock to its deadline. Events due at the same instant
    /// come out in the order they were scheduled.
    pub fn pop_due(&self, until: Duration) -> Option<TimerEvent> {
        let mut queue = self.queue();
        let index = queue
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (due, _, _))| *due <= until)
            .min_by_key(|(_, (due, seq, _))| (*due, *seq))
            .map(|(index, _)| index)?;
        let (due, _, event) = queue.pending.swap_remove(index);
        queue.now = queue.now.max(due);
        Some(event)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&self, now: Duration) {
        let mut queue = self.queue();
        queue.now = queue.now.max(now);
    }
}

impl TimerService for ManualTimers {
    fn schedule(&self, after: Duration, event: TimerEvent) {
        let mut queue = self.queue();
        let due = queue.now + after;
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push((due, seq, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TimerKind;

    fn event(kind: TimerKind, generation: u64) -> TimerEvent {
        TimerEvent { kind, generation }
    }

    #[test]
    fn events_pop_in_deadline_order() {
        let timers = ManualTimers::new();
        timers.schedule(Duration::from_secs(15), event(TimerKind::RoamWatchdog, 1));
        timers.schedule(Duration::from_secs(2), event(TimerKind::IpClientStartup, 1));
        timers.schedule(Duration::from_secs(2), event(TimerKind::RssiPoll, 1));

        let until = Duration::from_secs(10);
        assert_eq!(timers.pop_due(until), Some(event(TimerKind::IpClientStartup, 1)));
        assert_eq!(timers.pop_due(until), Some(event(TimerKind::RssiPoll, 1)));
        assert_eq!(timers.pop_due(until), None);
        assert_eq!(timers.now(), Duration::from_secs(2));
        assert_eq!(timers.pending(), 1);
    }

    #[test]
    fn schedule_is_relative_to_current_time() {
        let timers = ManualTimers::new();
        timers.set_now(Duration::from_secs(5));
        timers.schedule(Duration::from_secs(1), event(TimerKind::RssiPoll, 3));
        assert_eq!(timers.pop_due(Duration::from_secs(5)), None);
        assert!(timers.pop_due(Duration::from_secs(6)).is_some());
    }
}
