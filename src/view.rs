use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{available_slots, EngineError, SlotQuery};
use crate::limits::{
    CUSTOMER_HORIZON_DAYS, DEFAULT_GRANULARITY_MINUTES, MAX_WINDOW_DAYS, STAFF_HORIZON_DAYS,
};
use crate::model::{
    CandidateSlot, DayRange, Provider, ProviderId, Reservation, ReservationId, ServiceDefinition,
    ServiceId,
};
use crate::observability;
use crate::ports::{BookingStore, ChangeFeed, Directory, NewReservation, PortError};
use crate::reconcile::{FeedState, Reconciler, ReconcilerConfig, SnapshotHandle};

#[derive(Debug)]
pub enum ViewError {
    ProviderUnknown(ProviderId),
    ServiceUnknown(ServiceId),
    /// The store accepted a competing reservation first.
    SlotTaken { winner: ReservationId },
    Engine(EngineError),
    Port(PortError),
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewError::ProviderUnknown(id) => write!(f, "unknown provider {id}"),
            ViewError::ServiceUnknown(id) => write!(f, "unknown service {id}"),
            ViewError::SlotTaken { winner } => {
                write!(f, "slot already taken by reservation {winner}")
            }
            ViewError::Engine(e) => write!(f, "{e}"),
            ViewError::Port(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewError::Engine(e) => Some(e),
            ViewError::Port(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for ViewError {
    fn from(e: EngineError) -> Self {
        ViewError::Engine(e)
    }
}

impl From<PortError> for ViewError {
    fn from(e: PortError) -> Self {
        ViewError::Port(e)
    }
}

/// Horizon, grid step, and reconciler tuning for one view. The horizon
/// also sizes the mirrored window, so it is capped by `MAX_WINDOW_DAYS`.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub horizon_days: i64,
    pub granularity_minutes: i64,
    pub reconciler: ReconcilerConfig,
}

impl ViewConfig {
    /// Customer-facing default: book up to 30 days out.
    pub fn customer() -> Self {
        Self {
            horizon_days: CUSTOMER_HORIZON_DAYS,
            granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
            reconciler: ReconcilerConfig::default(),
        }
    }

    /// Staff-facing default: a tighter 14-day horizon.
    pub fn staff() -> Self {
        Self {
            horizon_days: STAFF_HORIZON_DAYS,
            ..Self::customer()
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::customer()
    }
}

/// Live availability for one provider and service: a reconciled
/// reservation mirror underneath, the pure slot engine on top, and
/// booking writes passed straight through to the store.
pub struct AvailabilityView {
    provider: Provider,
    service: ServiceDefinition,
    config: ViewConfig,
    store: Arc<dyn BookingStore>,
    handle: SnapshotHandle,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AvailabilityView {
    /// Opens a push-fed view: resolves the provider and service, starts a
    /// reconciler over `[first_day, first_day + horizon]`, and subscribes
    /// it to the change feed.
    pub async fn open(
        directory: &dyn Directory,
        store: Arc<dyn BookingStore>,
        feed: Arc<dyn ChangeFeed>,
        provider_id: ProviderId,
        service_id: ServiceId,
        first_day: NaiveDate,
        config: ViewConfig,
    ) -> Result<Self, ViewError> {
        let (provider, service) = resolve(directory, provider_id, service_id).await?;
        let reconciler = mirror(provider_id, first_day, &config, store.clone())?;
        let handle = reconciler.handle();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move { reconciler.run_push(feed, task_token).await });
        info!("opened live view for provider {} service {}", provider.id, service.id);
        Ok(Self { provider, service, config, store, handle, token, task: Some(task) })
    }

    /// Polling variant for stores without a change feed.
    pub async fn open_polling(
        directory: &dyn Directory,
        store: Arc<dyn BookingStore>,
        provider_id: ProviderId,
        service_id: ServiceId,
        first_day: NaiveDate,
        config: ViewConfig,
    ) -> Result<Self, ViewError> {
        let (provider, service) = resolve(directory, provider_id, service_id).await?;
        let reconciler = mirror(provider_id, first_day, &config, store.clone())?;
        let handle = reconciler.handle();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move { reconciler.run_poll(task_token).await });
        info!("opened polling view for provider {} service {}", provider.id, service.id);
        Ok(Self { provider, service, config, store, handle, token, task: Some(task) })
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    /// Slot board for one day against an explicit clock. Reads the mirror,
    /// never the store.
    pub async fn slots_at(
        &self,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<CandidateSlot>, ViewError> {
        let started = Instant::now();
        let reservations = self.handle.for_day(self.provider.id, date).await;
        let query = SlotQuery {
            granularity_minutes: self.config.granularity_minutes,
            ..SlotQuery::new(date, now, self.config.horizon_days)
        };
        let slots = available_slots(&self.provider, &self.service, &reservations, &query)?;
        metrics::counter!(observability::SLOT_QUERIES_TOTAL).increment(1);
        metrics::histogram!(observability::SLOT_QUERY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        debug!("{} slots for provider {} on {}", slots.len(), self.provider.id, date);
        Ok(slots)
    }

    /// `slots_at` against the local wall clock.
    pub async fn slots(&self, date: NaiveDate) -> Result<Vec<CandidateSlot>, ViewError> {
        self.slots_at(date, chrono::Local::now().naive_local()).await
    }

    /// Submits a reservation. The store is the arbiter: a losing race
    /// comes back as `SlotTaken` naming the surviving reservation, and the
    /// mirror catches up through the feed.
    pub async fn book(
        &self,
        start: NaiveDateTime,
        customer: Option<String>,
    ) -> Result<Reservation, ViewError> {
        metrics::counter!(observability::BOOKINGS_SUBMITTED_TOTAL).increment(1);
        let req = NewReservation {
            provider_id: self.provider.id,
            service_id: self.service.id,
            start,
            customer,
        };
        match self.store.create_reservation(req).await {
            Ok(reservation) => {
                info!("booked {} at {} with provider {}", reservation.id, start, self.provider.id);
                Ok(reservation)
            }
            Err(PortError::Conflict { winner }) => Err(ViewError::SlotTaken { winner }),
            Err(e) => Err(ViewError::Port(e)),
        }
    }

    /// Cancels through the store. Idempotent, like the store itself.
    pub async fn cancel(&self, id: ReservationId) -> Result<(), ViewError> {
        self.store.cancel_reservation(id).await?;
        info!("cancelled {} with provider {}", id, self.provider.id);
        Ok(())
    }

    pub fn feed_state(&self) -> FeedState {
        self.handle.state()
    }

    pub fn feed_states(&self) -> watch::Receiver<FeedState> {
        self.handle.states()
    }

    /// Ticks whenever the mirror changes; re-render on change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.handle.changes()
    }

    pub fn revision(&self) -> u64 {
        self.handle.revision()
    }

    /// Stops the reconciler and waits for it to wind down.
    pub async fn close(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for AvailabilityView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityView")
            .field("provider", &self.provider)
            .field("service", &self.service)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Drop for AvailabilityView {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn resolve(
    directory: &dyn Directory,
    provider_id: ProviderId,
    service_id: ServiceId,
) -> Result<(Provider, ServiceDefinition), ViewError> {
    let provider = directory
        .get_provider(provider_id)
        .await?
        .ok_or(ViewError::ProviderUnknown(provider_id))?;
    let service = directory
        .get_service(service_id)
        .await?
        .ok_or(ViewError::ServiceUnknown(service_id))?;
    Ok((provider, service))
}

fn mirror(
    provider_id: ProviderId,
    first_day: NaiveDate,
    config: &ViewConfig,
    store: Arc<dyn BookingStore>,
) -> Result<Arc<Reconciler>, ViewError> {
    if config.horizon_days < 0 || config.horizon_days >= MAX_WINDOW_DAYS {
        return Err(ViewError::Engine(EngineError::InvalidHorizon(config.horizon_days)));
    }
    // The horizon boundary day itself is bookable, so mirror it too
    let window = DayRange::spanning(first_day, (config.horizon_days + 1) as u64);
    Ok(Arc::new(Reconciler::new(provider_id, window, store, config.reconciler.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryBookingStore, InMemoryDirectory};
    use crate::model::{Shift, SlotStatus, WeeklyPattern};
    use chrono::{NaiveTime, Weekday};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::timeout;
    use ulid::Ulid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-03-14 is a Friday
    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        d().and_time(t(h, m))
    }

    fn seed(directory: &InMemoryDirectory) -> (ProviderId, ServiceId) {
        let service = ServiceDefinition {
            id: Ulid::new(),
            name: Some("trim".into()),
            duration_minutes: 30,
            price_cents: 3500,
        };
        let provider = Provider {
            id: Ulid::new(),
            name: Some("Noor".into()),
            active: true,
            pattern: WeeklyPattern::default()
                .with(Weekday::Fri, vec![Shift::new(t(9, 0), t(17, 0))]),
            services: HashSet::from([service.id]),
        };
        let (pid, sid) = (provider.id, service.id);
        directory.upsert_provider(provider);
        directory.upsert_service(service);
        (pid, sid)
    }

    fn fast() -> ViewConfig {
        ViewConfig {
            reconciler: ReconcilerConfig {
                poll_interval: Duration::from_millis(10),
                reconnect_backoff: Duration::from_millis(10),
            },
            ..ViewConfig::customer()
        }
    }

    #[test]
    fn config_defaults() {
        let customer = ViewConfig::customer();
        assert_eq!(customer.horizon_days, 30);
        assert_eq!(customer.granularity_minutes, 15);
        let staff = ViewConfig::staff();
        assert_eq!(staff.horizon_days, 14);
        assert_eq!(staff.granularity_minutes, 15);
        assert_eq!(ViewConfig::default().horizon_days, customer.horizon_days);
    }

    #[test]
    fn errors_read_well() {
        let e = ViewError::SlotTaken { winner: Ulid::nil() };
        assert!(e.to_string().starts_with("slot already taken"));
        let e = ViewError::Engine(EngineError::InvalidGranularity(0));
        assert!(e.to_string().contains("granularity"));
    }

    #[tokio::test]
    async fn open_rejects_unknown_provider() {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryBookingStore::new(directory.clone()));
        let feed = store.feed();
        let err = AvailabilityView::open(
            directory.as_ref(),
            store,
            feed,
            Ulid::new(),
            Ulid::new(),
            d(),
            fast(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ViewError::ProviderUnknown(_)));
    }

    #[tokio::test]
    async fn open_rejects_unknown_service() {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryBookingStore::new(directory.clone()));
        let (pid, _) = seed(&directory);
        let feed = store.feed();
        let err =
            AvailabilityView::open(directory.as_ref(), store, feed, pid, Ulid::new(), d(), fast())
                .await
                .unwrap_err();
        assert!(matches!(err, ViewError::ServiceUnknown(_)));
    }

    #[tokio::test]
    async fn open_rejects_oversized_horizon() {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryBookingStore::new(directory.clone()));
        let (pid, sid) = seed(&directory);
        let feed = store.feed();
        let config = ViewConfig { horizon_days: MAX_WINDOW_DAYS, ..fast() };
        let err = AvailabilityView::open(directory.as_ref(), store, feed, pid, sid, d(), config)
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::Engine(EngineError::InvalidHorizon(_))));
    }

    #[tokio::test]
    async fn losing_booking_maps_to_slot_taken() {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryBookingStore::new(directory.clone()));
        let (pid, sid) = seed(&directory);
        let feed = store.feed();
        let view = AvailabilityView::open(directory.as_ref(), store, feed, pid, sid, d(), fast())
            .await
            .unwrap();

        let won = view.book(at(10, 0), Some("mika".into())).await.unwrap();
        let err = view.book(at(10, 0), Some("ren".into())).await.unwrap_err();
        match err {
            ViewError::SlotTaken { winner } => assert_eq!(winner, won.id),
            other => panic!("expected SlotTaken, got {other}"),
        }
        view.close().await;
    }

    #[tokio::test]
    async fn slots_reflect_the_mirror() {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryBookingStore::new(directory.clone()));
        let (pid, sid) = seed(&directory);
        let feed = store.feed();
        let view = AvailabilityView::open(directory.as_ref(), store, feed, pid, sid, d(), fast())
            .await
            .unwrap();

        let mut states = view.feed_states();
        timeout(Duration::from_secs(2), states.wait_for(|s| *s == FeedState::Live))
            .await
            .unwrap()
            .unwrap();

        let before = view.revision();
        view.book(at(10, 0), None).await.unwrap();
        let mut revisions = view.changes();
        timeout(Duration::from_secs(2), revisions.wait_for(|r| *r > before))
            .await
            .unwrap()
            .unwrap();

        // Midnight clock keeps every slot of the day inside the window
        let slots = view.slots_at(d(), d().and_time(t(0, 0))).await.unwrap();
        let slot = slots.iter().find(|s| s.time == at(10, 0)).unwrap();
        assert_eq!(slot.status, SlotStatus::Booked);
        view.close().await;
    }
}
