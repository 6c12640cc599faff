use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type ProviderId = Ulid;
pub type ServiceId = Ulid;
pub type ReservationId = Ulid;

/// One contiguous working window inside a day, salon-local wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Shift {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "Shift start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Shift lists per weekday. The match in `shifts_for` is exhaustive, so a
/// change to the weekday vocabulary cannot compile without touching it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyPattern {
    pub monday: Vec<Shift>,
    pub tuesday: Vec<Shift>,
    pub wednesday: Vec<Shift>,
    pub thursday: Vec<Shift>,
    pub friday: Vec<Shift>,
    pub saturday: Vec<Shift>,
    pub sunday: Vec<Shift>,
}

impl WeeklyPattern {
    pub fn shifts_for(&self, day: Weekday) -> &[Shift] {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn set(&mut self, day: Weekday, shifts: Vec<Shift>) {
        let slot = match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        };
        *slot = shifts;
    }

    /// Builder form of `set` for wiring up fixtures and seed data.
    pub fn with(mut self, day: Weekday, shifts: Vec<Shift>) -> Self {
        self.set(day, shifts);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.monday.is_empty()
            && self.tuesday.is_empty()
            && self.wednesday.is_empty()
            && self.thursday.is_empty()
            && self.friday.is_empty()
            && self.saturday.is_empty()
            && self.sunday.is_empty()
    }
}

/// A bookable staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: Option<String>,
    /// Inactive providers expose no availability at all.
    pub active: bool,
    pub pattern: WeeklyPattern,
    /// Services this provider can perform.
    pub services: HashSet<ServiceId>,
}

impl Provider {
    pub fn offers(&self, service_id: ServiceId) -> bool {
        self.services.contains(&service_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: ServiceId,
    pub name: Option<String>,
    pub duration_minutes: i64,
    pub price_cents: i64,
}

/// A confirmed appointment occupying the half-open window `[start, end)`.
/// Cancellation is soft: the row stays, `active` flips to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub provider_id: ProviderId,
    pub service_id: ServiceId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub customer: Option<String>,
    pub active: bool,
}

impl Reservation {
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && start < self.end
    }

    /// True if the occupied window intersects the given day.
    pub fn touches_day(&self, day: NaiveDate) -> bool {
        let (day_start, day_end) = day_bounds(day);
        self.start < day_end && self.end > day_start
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// `[midnight, next midnight)` for a day.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    let end = day
        .succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

/// How a candidate slot presents to the caller.
///
/// Precedence when several apply: OutOfWindow > Booked > Free. A slot in
/// the past reports OutOfWindow even if nothing occupies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Free,
    Booked,
    OutOfWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub time: NaiveDateTime,
    pub status: SlotStatus,
    /// Set on free slots sitting close to occupied ones.
    pub warning: bool,
}

impl CandidateSlot {
    pub fn bookable(&self) -> bool {
        self.status == SlotStatus::Free
    }
}

/// The shared event vocabulary: the change feed publishes these, the poll
/// producer synthesizes them, one reducer consumes both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    Created(Reservation),
    Cancelled(Reservation),
}

impl ReservationEvent {
    pub fn reservation(&self) -> &Reservation {
        match self {
            ReservationEvent::Created(r) | ReservationEvent::Cancelled(r) => r,
        }
    }

    pub fn id(&self) -> ReservationId {
        self.reservation().id
    }
}

/// Inclusive day span for snapshot windows and listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DayRange {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        debug_assert!(first <= last, "DayRange first must not be after last");
        Self { first, last }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { first: day, last: day }
    }

    /// Range covering `days` days starting at `first`.
    pub fn spanning(first: NaiveDate, days: u64) -> Self {
        debug_assert!(days >= 1, "DayRange must cover at least one day");
        let last = first
            .checked_add_days(chrono::Days::new(days.saturating_sub(1)))
            .unwrap_or(NaiveDate::MAX);
        Self { first, last }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }

    pub fn num_days(&self) -> i64 {
        (self.last - self.first).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.first.iter_days().take(self.num_days() as usize)
    }
}
