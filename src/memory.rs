use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use futures::stream::BoxStream;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::limits::{FEED_CHANNEL_CAPACITY, MAX_CUSTOMER_LEN};
use crate::model::{
    day_bounds, DayRange, Provider, ProviderId, Reservation, ReservationEvent, ReservationId,
    ServiceDefinition, ServiceId,
};
use crate::observability;
use crate::ports::{BookingStore, ChangeFeed, Directory, FeedMessage, NewReservation, PortError};

/// Directory backed by process-local maps. Seeds fixtures in tests and
/// serves as the directory of the embedded single-process deployment.
#[derive(Default)]
pub struct InMemoryDirectory {
    providers: DashMap<ProviderId, Provider>,
    services: DashMap<ServiceId, ServiceDefinition>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_provider(&self, provider: Provider) {
        self.providers.insert(provider.id, provider);
    }

    pub fn upsert_service(&self, service: ServiceDefinition) {
        self.services.insert(service.id, service);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>, PortError> {
        Ok(self.providers.get(&id).map(|e| e.value().clone()))
    }

    async fn get_service(&self, id: ServiceId) -> Result<Option<ServiceDefinition>, PortError> {
        Ok(self.services.get(&id).map(|e| e.value().clone()))
    }
}

/// Broadcast fan-out of reservation changes, one channel per provider.
pub struct FeedHub {
    channels: DashMap<ProviderId, broadcast::Sender<ReservationEvent>>,
    capacity: usize,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::with_capacity(FEED_CHANNEL_CAPACITY)
    }

    /// Small capacities force `Lagged` deliveries, which tests rely on.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    pub fn subscribe_events(
        &self,
        provider_id: ProviderId,
    ) -> broadcast::Receiver<ReservationEvent> {
        let sender = self
            .channels
            .entry(provider_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        sender.subscribe()
    }

    /// Publish a change. No-op if nobody is listening.
    pub fn publish(&self, event: &ReservationEvent) {
        if let Some(sender) = self.channels.get(&event.reservation().provider_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a provider's channel, ending its subscriptions.
    pub fn remove(&self, provider_id: &ProviderId) {
        self.channels.remove(provider_id);
    }
}

#[async_trait]
impl ChangeFeed for FeedHub {
    async fn subscribe(
        &self,
        provider_id: ProviderId,
    ) -> Result<BoxStream<'static, FeedMessage>, PortError> {
        let rx = self.subscribe_events(provider_id);
        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((FeedMessage::Event(event), rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => Some((FeedMessage::Lagged, rx)),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })))
    }
}

/// Reservation system of record for embedded and test use.
///
/// Create runs the overlap check under the provider's write lock, so two
/// racing clients can never both win the same window: whoever reaches
/// the lock first wins, not whoever displayed a free slot last.
pub struct InMemoryBookingStore {
    directory: Arc<InMemoryDirectory>,
    rows: DashMap<ProviderId, Arc<RwLock<Vec<Reservation>>>>,
    feed: Arc<FeedHub>,
}

impl InMemoryBookingStore {
    pub fn new(directory: Arc<InMemoryDirectory>) -> Self {
        Self::with_feed(directory, Arc::new(FeedHub::new()))
    }

    pub fn with_feed(directory: Arc<InMemoryDirectory>, feed: Arc<FeedHub>) -> Self {
        Self {
            directory,
            rows: DashMap::new(),
            feed,
        }
    }

    pub fn feed(&self) -> Arc<FeedHub> {
        self.feed.clone()
    }

    fn provider_rows(&self, provider_id: ProviderId) -> Arc<RwLock<Vec<Reservation>>> {
        self.rows.entry(provider_id).or_default().clone()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn list_reservations(
        &self,
        provider_id: ProviderId,
        range: DayRange,
        active_only: bool,
    ) -> Result<Vec<Reservation>, PortError> {
        let (window_start, _) = day_bounds(range.first);
        let (_, window_end) = day_bounds(range.last);
        let rows = self.provider_rows(provider_id);
        let guard = rows.read().await;
        Ok(guard
            .iter()
            .filter(|r| (!active_only || r.active) && r.start < window_end && r.end > window_start)
            .cloned()
            .collect())
    }

    async fn create_reservation(&self, req: NewReservation) -> Result<Reservation, PortError> {
        let Some(service) = self.directory.get_service(req.service_id).await? else {
            return Err(PortError::Rejected {
                reason: format!("unknown service {}", req.service_id),
            });
        };
        if let Some(customer) = &req.customer
            && customer.len() > MAX_CUSTOMER_LEN
        {
            return Err(PortError::Rejected {
                reason: "customer label too long".into(),
            });
        }
        let end = req.start + Duration::minutes(service.duration_minutes);

        let rows = self.provider_rows(req.provider_id);
        let mut guard = rows.write().await;
        // Definitive check, made under the write lock; the advisory check
        // the display ran earlier does not count
        if let Some(winner) = guard.iter().find(|r| r.active && r.overlaps(req.start, end)) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            warn!("create at {} rejected: window taken by {}", req.start, winner.id);
            return Err(PortError::Conflict { winner: winner.id });
        }
        let row = Reservation {
            id: Ulid::new(),
            provider_id: req.provider_id,
            service_id: req.service_id,
            start: req.start,
            end,
            customer: req.customer,
            active: true,
        };
        guard.push(row.clone());
        self.feed.publish(&ReservationEvent::Created(row.clone()));
        debug!("created reservation {} [{} .. {})", row.id, row.start, row.end);
        Ok(row)
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<(), PortError> {
        let stores: Vec<Arc<RwLock<Vec<Reservation>>>> =
            self.rows.iter().map(|e| e.value().clone()).collect();
        for rows in stores {
            let mut guard = rows.write().await;
            if let Some(row) = guard.iter_mut().find(|r| r.id == id) {
                if row.active {
                    row.active = false;
                    let cancelled = row.clone();
                    self.feed.publish(&ReservationEvent::Cancelled(cancelled));
                    debug!("cancelled reservation {id}");
                }
                return Ok(());
            }
        }
        Err(PortError::Rejected {
            reason: format!("unknown reservation {id}"),
        })
    }
}
