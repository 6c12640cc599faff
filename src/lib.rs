//! Availability and slot scheduling for appointment providers.
//!
//! The pure engine in [`engine`] turns a provider's weekly working
//! pattern, one service, and a set of reservations into a classified
//! slot board for a day. Around it, [`reconcile`] keeps a local mirror
//! of the booking store consistent through a change feed or by polling,
//! and [`view`] composes both into a live availability view that can
//! also book and cancel. Ports in [`ports`] abstract the store; the
//! [`memory`] adapters implement them for embedded use and tests.
//!
//! All times are wall-clock `chrono` naive values in the salon's own
//! timezone. Reservation windows are half-open.

pub mod engine;
pub mod limits;
pub mod memory;
pub mod model;
pub mod observability;
pub mod ports;
pub mod reconcile;
pub mod snapshot;
pub mod view;

pub use engine::{available_slots, EngineError, SlotQuery};
pub use model::{
    CandidateSlot, DayRange, Provider, ProviderId, Reservation, ReservationEvent, ReservationId,
    ServiceDefinition, ServiceId, Shift, SlotStatus, WeeklyPattern,
};
pub use ports::{BookingStore, ChangeFeed, Directory, FeedMessage, NewReservation, PortError};
pub use reconcile::{FeedState, Reconciler, ReconcilerConfig, SnapshotHandle};
pub use view::{AvailabilityView, ViewConfig, ViewError};
