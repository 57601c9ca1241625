//! Bridges the pull-only player surface to push-expecting clients.
//!
//! The broadcaster polls the surface at a fixed interval, but only while at
//! least one client session is alive, and only fans a snapshot out when it
//! meaningfully differs from its predecessor. The last observed snapshot is
//! retained across polling stops so a newly connecting client can render
//! immediately instead of waiting a full poll tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::player::{PlayerSnapshot, PlayerSurface};

/// Start/stop state for the poll loop, driven by the session count.
#[derive(Debug, Default)]
struct PollState {
    clients: usize,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Inner {
    surface: Arc<dyn PlayerSurface>,
    poll_interval: Duration,
    sender: broadcast::Sender<PlayerSnapshot>,
    last_snapshot: Mutex<Option<PlayerSnapshot>>,
    poll_state: Mutex<PollState>,
    polls: AtomicUsize,
}

impl Inner {
    /// One poll cycle: snapshot the surface, gate on meaningful change,
    /// broadcast and retain on change.
    ///
    /// A failed poll or an explicit nothing-playing result skips the cycle
    /// without touching the retained snapshot.
    async fn poll_once(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);

        let snapshot = match self.surface.snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(error) => {
                tracing::debug!(error = %error, "snapshot poll failed, skipping cycle");
                return;
            }
        };

        let changed = {
            let mut guard = self
                .last_snapshot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let changed = guard
                .as_ref()
                .is_none_or(|previous| snapshot.differs_from(previous));
            if changed {
                *guard = Some(snapshot.clone());
            }
            changed
        };

        if changed {
            // No receivers is fine: the value is retained for late joiners.
            let delivered = self.sender.send(snapshot).unwrap_or(0);
            tracing::trace!(delivered, "snapshot broadcast");
        }
    }

    fn last_snapshot(&self) -> Option<PlayerSnapshot> {
        self.last_snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Poll loop body. Ticks are skipped, never stacked, while a surface call
/// is in flight, so cycles are single-flight by construction.
async fn poll_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        inner.poll_once().await;
    }
}

/// Change-detection broadcaster over the player surface.
///
/// Cheap to clone; all clones share the poll loop, the retained snapshot,
/// and the broadcast channel.
#[derive(Debug, Clone)]
pub struct SnapshotBroadcaster {
    inner: Arc<Inner>,
}

impl SnapshotBroadcaster {
    /// Creates a broadcaster polling `surface` every `poll_interval` while
    /// clients are connected. `capacity` bounds the broadcast ring buffer;
    /// lagging receivers lose the oldest snapshots.
    #[must_use]
    pub fn new(surface: Arc<dyn PlayerSurface>, poll_interval: Duration, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                surface,
                poll_interval,
                sender,
                last_snapshot: Mutex::new(None),
                poll_state: Mutex::new(PollState::default()),
                polls: AtomicUsize::new(0),
            }),
        }
    }

    /// Registers a connected client. The first session starts the poll
    /// loop; dropping the last one stops it.
    #[must_use]
    pub fn begin_session(&self) -> ClientSession {
        let receiver = self.inner.sender.subscribe();

        let mut state = self
            .inner
            .poll_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.clients += 1;
        if state.clients == 1 && state.task.is_none() {
            tracing::debug!("first client connected, starting snapshot polling");
            state.task = Some(tokio::spawn(poll_loop(Arc::clone(&self.inner))));
        }
        drop(state);

        ClientSession {
            inner: Arc::clone(&self.inner),
            receiver,
        }
    }

    /// Number of poll cycles executed so far.
    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.inner.polls.load(Ordering::Relaxed)
    }

    /// The most recent broadcast-worthy snapshot, retained across polling
    /// stops.
    #[must_use]
    pub fn last_snapshot(&self) -> Option<PlayerSnapshot> {
        self.inner.last_snapshot()
    }
}

/// Handle representing one connected client.
///
/// Holds a broadcast receiver positioned at session start and keeps the
/// poll loop alive; dropping it releases the reference count.
#[derive(Debug)]
pub struct ClientSession {
    inner: Arc<Inner>,
    receiver: broadcast::Receiver<PlayerSnapshot>,
}

impl ClientSession {
    /// Snapshot to push to this client immediately on connect, if any.
    #[must_use]
    pub fn initial_snapshot(&self) -> Option<PlayerSnapshot> {
        self.inner.last_snapshot()
    }

    /// Waits for the next broadcast snapshot.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`broadcast::error::RecvError`]: `Lagged`
    /// when this client fell behind the ring buffer, `Closed` when the
    /// broadcaster is gone.
    pub async fn recv(&mut self) -> Result<PlayerSnapshot, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        let mut state = self
            .inner
            .poll_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.clients = state.clients.saturating_sub(1);
        if state.clients == 0
            && let Some(task) = state.task.take()
        {
            tracing::debug!("last client disconnected, stopping snapshot polling");
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::player::{PlayerCommand, SurfaceError};
    use std::collections::VecDeque;

    /// Surface double replaying a fixed sequence of poll results.
    #[derive(Debug, Default)]
    struct ScriptedSurface {
        polls: Mutex<VecDeque<Result<Option<PlayerSnapshot>, SurfaceError>>>,
    }

    impl ScriptedSurface {
        fn replaying(
            polls: impl IntoIterator<Item = Result<Option<PlayerSnapshot>, SurfaceError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                polls: Mutex::new(polls.into_iter().collect()),
            })
        }
    }

    #[async_trait::async_trait]
    impl PlayerSurface for ScriptedSurface {
        async fn snapshot(&self) -> Result<Option<PlayerSnapshot>, SurfaceError> {
            self.polls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn execute(&self, _command: PlayerCommand) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    fn track(name: &str, current_time: f64, is_playing: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            name: name.to_string(),
            artist: "Miles Davis".to_string(),
            album: "Kind of Blue".to_string(),
            current_time,
            duration: 337.0,
            is_playing,
        }
    }

    /// Broadcaster with a poll interval long enough that only manually
    /// driven cycles run within a test.
    fn manual_broadcaster(surface: Arc<ScriptedSurface>) -> SnapshotBroadcaster {
        SnapshotBroadcaster::new(surface, Duration::from_secs(3600), 16)
    }

    #[tokio::test]
    async fn first_snapshot_always_broadcasts() {
        let broadcaster =
            manual_broadcaster(ScriptedSurface::replaying([Ok(Some(track("A", 0.0, true)))]));
        let mut rx = broadcaster.inner.sender.subscribe();

        broadcaster.inner.poll_once().await;

        let Ok(snapshot) = rx.try_recv() else {
            panic!("expected a broadcast");
        };
        assert_eq!(snapshot.name, "A");
    }

    #[tokio::test]
    async fn sub_second_progress_is_suppressed() {
        let broadcaster = manual_broadcaster(ScriptedSurface::replaying([
            Ok(Some(track("A", 10.0, true))),
            Ok(Some(track("A", 10.4, true))),
        ]));
        let mut rx = broadcaster.inner.sender.subscribe();

        broadcaster.inner.poll_once().await;
        broadcaster.inner.poll_once().await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn seeks_and_play_state_flips_broadcast() {
        let broadcaster = manual_broadcaster(ScriptedSurface::replaying([
            Ok(Some(track("A", 10.0, true))),
            Ok(Some(track("A", 12.0, true))),
            Ok(Some(track("A", 12.0, false))),
        ]));
        let mut rx = broadcaster.inner.sender.subscribe();

        for _ in 0..3 {
            broadcaster.inner.poll_once().await;
        }

        let received: Vec<PlayerSnapshot> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(received.len(), 3);
        let Some(last) = received.last() else {
            panic!("expected broadcasts");
        };
        assert!(!last.is_playing);
    }

    #[tokio::test]
    async fn failed_poll_leaves_retained_snapshot_untouched() {
        let broadcaster = manual_broadcaster(ScriptedSurface::replaying([
            Ok(Some(track("A", 10.0, true))),
            Err(SurfaceError::Execution("player went away".to_string())),
            Ok(None),
        ]));

        for _ in 0..3 {
            broadcaster.inner.poll_once().await;
        }

        let Some(retained) = broadcaster.last_snapshot() else {
            panic!("snapshot should be retained");
        };
        assert_eq!(retained.name, "A");
        assert!((retained.current_time - 10.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn late_joiner_sees_retained_snapshot_without_waiting() {
        let broadcaster =
            manual_broadcaster(ScriptedSurface::replaying([Ok(Some(track("A", 5.0, true)))]));
        broadcaster.inner.poll_once().await;

        let session = broadcaster.begin_session();
        let Some(initial) = session.initial_snapshot() else {
            panic!("late joiner should get the retained snapshot");
        };
        assert_eq!(initial.name, "A");
    }

    #[tokio::test]
    async fn no_polling_without_clients() {
        let surface = ScriptedSurface::replaying([Ok(Some(track("A", 0.0, true)))]);
        let broadcaster = SnapshotBroadcaster::new(surface, Duration::from_millis(10), 16);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(broadcaster.poll_count(), 0);
    }

    #[tokio::test]
    async fn polling_starts_with_first_session_and_stops_with_last() {
        let surface = ScriptedSurface::replaying([]);
        let broadcaster = SnapshotBroadcaster::new(surface, Duration::from_millis(10), 16);

        let first = broadcaster.begin_session();
        let second = broadcaster.begin_session();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(broadcaster.poll_count() > 0);

        drop(first);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(
            broadcaster.poll_count() > 0,
            "polling continues while a session remains"
        );

        drop(second);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let settled = broadcaster.poll_count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(broadcaster.poll_count(), settled, "no polls after last drop");
    }

    #[tokio::test]
    async fn session_receives_broadcasts_in_order() {
        let broadcaster = manual_broadcaster(ScriptedSurface::replaying([
            Ok(Some(track("A", 0.0, true))),
            Ok(Some(track("B", 0.0, true))),
        ]));
        let mut session = broadcaster.begin_session();

        broadcaster.inner.poll_once().await;
        broadcaster.inner.poll_once().await;

        let Ok(first) = session.recv().await else {
            panic!("expected first broadcast");
        };
        let Ok(second) = session.recv().await else {
            panic!("expected second broadcast");
        };
        assert_eq!((first.name.as_str(), second.name.as_str()), ("A", "B"));
    }
}
