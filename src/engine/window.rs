use chrono::{Duration, NaiveDateTime};

/// Booking window test. A candidate strictly before `now` or strictly
/// after `now + horizon_days` is out of window; both boundaries themselves
/// are bookable.
///
/// `horizon_days` is always supplied by the caller; the customer surface
/// passes a longer horizon than the staff surface.
pub fn in_window(candidate: NaiveDateTime, now: NaiveDateTime, horizon_days: i64) -> bool {
    if candidate < now {
        return false;
    }
    candidate <= now + Duration::days(horizon_days)
}
