use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::StreamExt;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::limits::{DEFAULT_POLL_INTERVAL, DEFAULT_RECONNECT_BACKOFF, MAX_WINDOW_DAYS};
use crate::model::{DayRange, ProviderId, Reservation, ReservationEvent};
use crate::observability;
use crate::ports::{BookingStore, ChangeFeed, FeedMessage, PortError};
use crate::snapshot::{diff_snapshot, ReservationSnapshot};

/// Where the mirror stands relative to the booking store.
///
/// Every transition into `Live` is preceded by a full re-fetch: events
/// published while we were away are gone, so the snapshot cannot be
/// trusted until it has been rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Live,
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub poll_interval: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

/// Shared read side of a reconciler: the mirrored snapshot plus the two
/// signals a display needs, state transitions and change revisions.
#[derive(Clone)]
pub struct SnapshotHandle {
    snapshot: Arc<RwLock<ReservationSnapshot>>,
    state: watch::Receiver<FeedState>,
    revision: watch::Receiver<u64>,
}

impl SnapshotHandle {
    /// Owned copy of the rows touching one provider day, taken under the
    /// read lock and released before any engine work.
    pub async fn for_day(&self, provider_id: ProviderId, day: NaiveDate) -> Vec<Reservation> {
        self.snapshot.read().await.for_day(provider_id, day)
    }

    pub async fn all(&self) -> Vec<Reservation> {
        self.snapshot.read().await.all()
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Bumps on every applied change and resync; re-query on change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }

    pub fn states(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }
}

/// Keeps one provider's reservation mirror consistent with the booking
/// store, fed either by a push subscription (`run_push`) or by polling
/// (`run_poll`). Both producers feed the same reducer.
pub struct Reconciler {
    provider_id: ProviderId,
    window: DayRange,
    store: Arc<dyn BookingStore>,
    snapshot: Arc<RwLock<ReservationSnapshot>>,
    state_tx: watch::Sender<FeedState>,
    revision_tx: watch::Sender<u64>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        provider_id: ProviderId,
        window: DayRange,
        store: Arc<dyn BookingStore>,
        config: ReconcilerConfig,
    ) -> Self {
        debug_assert!(window.num_days() <= MAX_WINDOW_DAYS, "window too wide to mirror");
        let (state_tx, _) = watch::channel(FeedState::Disconnected);
        let (revision_tx, _) = watch::channel(0);
        Self {
            provider_id,
            window,
            store,
            snapshot: Arc::new(RwLock::new(ReservationSnapshot::new())),
            state_tx,
            revision_tx,
            config,
        }
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    pub fn window(&self) -> DayRange {
        self.window
    }

    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            snapshot: self.snapshot.clone(),
            state: self.state_tx.subscribe(),
            revision: self.revision_tx.subscribe(),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: FeedState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            debug!("feed {:?} -> {:?} for {}", prev, next, self.provider_id);
        }
    }

    fn bump_revision(&self) {
        self.revision_tx.send_modify(|r| *r += 1);
    }

    /// Full fetch of the window, replacing the mirror wholesale. A failed
    /// fetch returns the error and leaves the previous snapshot untouched.
    pub async fn resync(&self) -> Result<usize, PortError> {
        let rows = self
            .store
            .list_reservations(self.provider_id, self.window, false)
            .await?;
        let count = rows.len();
        self.snapshot.write().await.replace_all(rows);
        self.bump_revision();
        metrics::counter!(observability::RECONCILE_RESYNCS_TOTAL).increment(1);
        self.record_mirror_size(count);
        info!("resynced {} reservations for {}", count, self.provider_id);
        Ok(count)
    }

    fn record_mirror_size(&self, count: usize) {
        let provider = self.provider_id.to_string();
        metrics::gauge!(observability::SNAPSHOT_RESERVATIONS, "provider" => provider)
            .set(count as f64);
    }

    async fn apply(&self, event: &ReservationEvent) {
        let (changed, count) = {
            let mut guard = self.snapshot.write().await;
            (guard.apply(event), guard.len())
        };
        if changed {
            self.bump_revision();
            let kind = observability::event_label(event);
            metrics::counter!(observability::RECONCILE_EVENTS_TOTAL, "kind" => kind).increment(1);
            self.record_mirror_size(count);
            debug!("applied {} {}", kind, event.id());
        } else {
            debug!("ignored duplicate event for {}", event.id());
        }
    }

    /// Push consumption. Subscribe first, then full re-fetch, then stream:
    /// nothing published during the fetch can be missed, and the reducer
    /// swallows whatever the fetch already contained.
    pub async fn run_push(&self, feed: Arc<dyn ChangeFeed>, shutdown: CancellationToken) {
        loop {
            self.set_state(FeedState::Connecting);
            let mut stream = match feed.subscribe(self.provider_id).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("subscribe failed for {}: {e}", self.provider_id);
                    if !self.pause(&shutdown).await {
                        return;
                    }
                    continue;
                }
            };
            if let Err(e) = self.resync().await {
                warn!("resync failed for {}: {e}", self.provider_id);
                if !self.pause(&shutdown).await {
                    return;
                }
                continue;
            }
            self.set_state(FeedState::Live);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        self.set_state(FeedState::Disconnected);
                        info!("reconciler for {} shut down", self.provider_id);
                        return;
                    }
                    msg = stream.next() => match msg {
                        Some(FeedMessage::Event(event)) => self.apply(&event).await,
                        Some(FeedMessage::Lagged) => {
                            warn!("feed lagged for {}; rebuilding mirror", self.provider_id);
                            metrics::counter!(observability::FEED_LAGGED_TOTAL).increment(1);
                            self.set_state(FeedState::Connecting);
                            match self.resync().await {
                                Ok(_) => self.set_state(FeedState::Live),
                                Err(e) => {
                                    warn!("lag resync failed for {}: {e}", self.provider_id);
                                    break;
                                }
                            }
                        }
                        None => {
                            warn!("feed subscription ended for {}", self.provider_id);
                            break;
                        }
                    }
                }
            }

            self.set_state(FeedState::Disconnected);
            if !self.pause(&shutdown).await {
                return;
            }
        }
    }

    /// Poll production: fetch the window on an interval, reduce the
    /// listing to events by diffing, and apply them through the same
    /// reducer the push path uses. A failed fetch keeps the last good
    /// mirror and reports `Disconnected` until a tick succeeds again.
    pub async fn run_poll(&self, shutdown: CancellationToken) {
        self.set_state(FeedState::Connecting);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.set_state(FeedState::Disconnected);
                    info!("poller for {} shut down", self.provider_id);
                    return;
                }
                _ = ticker.tick() => {
                    match self.store.list_reservations(self.provider_id, self.window, false).await {
                        Ok(rows) => {
                            let events = {
                                let guard = self.snapshot.read().await;
                                diff_snapshot(&guard, &rows)
                            };
                            for event in &events {
                                self.apply(event).await;
                            }
                            if !events.is_empty() {
                                debug!(
                                    "poll reconciled {} events for {}",
                                    events.len(),
                                    self.provider_id
                                );
                            }
                            self.set_state(FeedState::Live);
                        }
                        Err(e) => {
                            warn!("poll fetch failed for {}: {e}", self.provider_id);
                            self.set_state(FeedState::Disconnected);
                        }
                    }
                }
            }
        }
    }

    /// Backoff that aborts early on shutdown. Returns false when cancelled.
    async fn pause(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => {
                self.set_state(FeedState::Disconnected);
                false
            }
            _ = tokio::time::sleep(self.config.reconnect_backoff) => true,
        }
    }
}
