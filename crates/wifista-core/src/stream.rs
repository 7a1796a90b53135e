// ── Reactive station streams ──
//
// Subscription types for consuming state changes from a running
// station.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::warn;

use crate::machine::{StateChange, StationSnapshot};

/// Every `StateChange` published after subscription, in order.
///
/// A subscriber that falls more than the channel capacity behind skips
/// the oldest changes; the gap is logged and the stream carries on.
pub struct StateChangeStream {
    inner: BroadcastStream<Arc<StateChange>>,
}

impl StateChangeStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<StateChange>>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for StateChangeStream {
    type Item = Arc<StateChange>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(change))) => return Poll::Ready(Some(change)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "state change subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// `Stream` adapter over snapshot updates.
///
/// Yields the current snapshot first and then one item per published
/// change; intermediate snapshots may be coalesced.
pub struct SnapshotStream {
    inner: WatchStream<StationSnapshot>,
}

impl SnapshotStream {
    pub fn new(receiver: watch::Receiver<StationSnapshot>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for SnapshotStream {
    type Item = StationSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::machine::LeafState;
    use crate::model::DetailedState;

    fn change(sequence: u64) -> Arc<StateChange> {
        Arc::new(StateChange {
            sequence,
            at: Utc::now(),
            previous: LeafState::Disconnected,
            state: LeafState::L2Connecting,
            detailed: DetailedState::Connecting,
            network_id: None,
        })
    }

    #[test]
    fn lagged_subscriber_skips_to_the_oldest_retained_change() {
        let (tx, rx) = broadcast::channel(2);
        let mut stream = task::spawn(StateChangeStream::new(rx));
        assert_pending!(stream.poll_next());

        for sequence in 1..=3 {
            tx.send(change(sequence)).unwrap();
        }
        assert!(stream.is_woken());

        let first = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(first.sequence, 2);
        let second = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(second.sequence, 3);
        assert_pending!(stream.poll_next());

        drop(tx);
        assert!(assert_ready!(stream.poll_next()).is_none());
    }

    #[test]
    fn snapshot_stream_starts_with_the_current_value() {
        let (tx, rx) = watch::channel(StationSnapshot::default());
        let mut stream = task::spawn(SnapshotStream::new(rx));

        let first = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(first.state, LeafState::Disconnected);
        assert_pending!(stream.poll_next());

        tx.send_modify(|snapshot| snapshot.state = LeafState::L2Connecting);
        let next = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(next.state, LeafState::L2Connecting);
    }
}
