use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::{ProviderId, Reservation};

/// Reservations that can collide with this provider's candidates on the
/// given day: active, same provider, occupied window touching the day.
/// Everything else is filtered out before any overlap test runs.
pub fn relevant_reservations<'a>(
    reservations: &'a [Reservation],
    provider_id: ProviderId,
    day: NaiveDate,
) -> Vec<&'a Reservation> {
    reservations
        .iter()
        .filter(|r| r.active && r.provider_id == provider_id && r.touches_day(day))
        .collect()
}

/// Half-open occupancy test for one candidate: `[candidate, candidate + d)`
/// collides with `[r.start, r.end)` iff `candidate < r.end` and
/// `candidate + d > r.start`. Abutting windows never collide.
pub fn is_occupied(
    candidate: NaiveDateTime,
    duration_minutes: i64,
    relevant: &[&Reservation],
) -> bool {
    let end = candidate + Duration::minutes(duration_minutes);
    relevant.iter().any(|r| r.overlaps(candidate, end))
}
