mod conflict;
mod error;
mod grid;
mod pattern;
mod warnings;
mod window;

pub use conflict::{is_occupied, relevant_reservations};
pub use error::EngineError;
pub use grid::slot_grid;
pub use pattern::day_shifts;
pub use warnings::mark_warnings;
pub use window::in_window;

use chrono::{NaiveDate, NaiveDateTime};

use crate::limits::*;
use crate::model::{CandidateSlot, Provider, Reservation, ServiceDefinition, SlotStatus};

/// Everything one availability computation needs besides the domain rows.
/// `now` is explicit so callers own the clock.
#[derive(Debug, Clone, Copy)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub now: NaiveDateTime,
    pub horizon_days: i64,
    pub granularity_minutes: i64,
}

impl SlotQuery {
    pub fn new(date: NaiveDate, now: NaiveDateTime, horizon_days: i64) -> Self {
        Self {
            date,
            now,
            horizon_days,
            granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
        }
    }
}

/// Candidate slots for one provider, service, and day.
///
/// Pure and deterministic: the caller supplies the reservations and the
/// clock. Configuration gaps (inactive provider, service not offered, no
/// shifts that weekday) answer with an empty vector; only a malformed
/// query is an error. Output is strictly ascending with no duplicates.
///
/// Classification precedence per candidate: out of window beats booked
/// beats free, so a slot in the past reports `OutOfWindow` even when
/// nothing occupies it.
pub fn available_slots(
    provider: &Provider,
    service: &ServiceDefinition,
    reservations: &[Reservation],
    query: &SlotQuery,
) -> Result<Vec<CandidateSlot>, EngineError> {
    if service.duration_minutes <= 0 || service.duration_minutes > MAX_SERVICE_DURATION_MINUTES {
        return Err(EngineError::InvalidDuration(service.duration_minutes));
    }
    if query.horizon_days < 0 || query.horizon_days > MAX_HORIZON_DAYS {
        return Err(EngineError::InvalidHorizon(query.horizon_days));
    }
    if !(MIN_GRANULARITY_MINUTES..=MAX_GRANULARITY_MINUTES).contains(&query.granularity_minutes) {
        return Err(EngineError::InvalidGranularity(query.granularity_minutes));
    }

    if !provider.active || !provider.offers(service.id) {
        return Ok(Vec::new());
    }
    let shifts = day_shifts(provider, query.date);
    if shifts.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = slot_grid(query.date, shifts, query.granularity_minutes)?;
    let relevant = relevant_reservations(reservations, provider.id, query.date);

    let mut slots: Vec<CandidateSlot> = candidates
        .into_iter()
        .map(|time| {
            let status = if !in_window(time, query.now, query.horizon_days) {
                SlotStatus::OutOfWindow
            } else if is_occupied(time, service.duration_minutes, &relevant) {
                SlotStatus::Booked
            } else {
                SlotStatus::Free
            };
            CandidateSlot { time, status, warning: false }
        })
        .collect();

    mark_warnings(&mut slots, service.duration_minutes, query.granularity_minutes);
    Ok(slots)
}
