use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::BoxStream;

use crate::model::{
    DayRange, Provider, ProviderId, Reservation, ReservationEvent, ReservationId,
    ServiceDefinition, ServiceId,
};

/// Read side of the salon directory: who works here, what do they offer.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>, PortError>;
    async fn get_service(&self, id: ServiceId) -> Result<Option<ServiceDefinition>, PortError>;
}

/// Booking request as the caller states it. The store derives `end` from
/// the service duration and assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub provider_id: ProviderId,
    pub service_id: ServiceId,
    pub start: NaiveDateTime,
    pub customer: Option<String>,
}

/// The definitive reservation system of record.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn list_reservations(
        &self,
        provider_id: ProviderId,
        range: DayRange,
        active_only: bool,
    ) -> Result<Vec<Reservation>, PortError>;

    /// The store revalidates overlap under its own lock; a losing create
    /// gets `PortError::Conflict` naming the reservation that won.
    async fn create_reservation(&self, req: NewReservation) -> Result<Reservation, PortError>;

    async fn cancel_reservation(&self, id: ReservationId) -> Result<(), PortError>;
}

/// One message on a change-feed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Event(ReservationEvent),
    /// The subscriber fell behind a bounded channel and lost events; the
    /// mirror must be rebuilt from a full fetch.
    Lagged,
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Live stream of reservation changes for one provider. The stream
    /// ending means the subscription dropped.
    async fn subscribe(
        &self,
        provider_id: ProviderId,
    ) -> Result<BoxStream<'static, FeedMessage>, PortError>;
}

#[derive(Debug)]
pub enum PortError {
    /// An upstream dependency could not be reached or answered abnormally.
    Unavailable {
        service: &'static str,
        reason: String,
    },
    /// The booking store refused a create because the window is taken.
    Conflict { winner: ReservationId },
    /// The store refused the request itself (unknown ids, oversized fields).
    Rejected { reason: String },
}

impl std::fmt::Display for PortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortError::Unavailable { service, reason } => {
                write!(f, "{service} unavailable: {reason}")
            }
            PortError::Conflict { winner } => write!(f, "window taken by reservation {winner}"),
            PortError::Rejected { reason } => write!(f, "rejected by store: {reason}"),
        }
    }
}

impl std::error::Error for PortError {}
