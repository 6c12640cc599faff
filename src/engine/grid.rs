use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::limits::*;
use crate::model::Shift;

use super::EngineError;

/// Candidate start times for a day's shifts on a fixed-minute grid.
///
/// Each shift contributes `start`, `start + g`, ... for as long as a full
/// step still fits before the shift ends (`current + g <= end`). The
/// combined result is sorted and deduplicated, so overlapping or unordered
/// shifts cannot double-emit a candidate. Degenerate shifts contribute
/// nothing.
pub fn slot_grid(
    day: NaiveDate,
    shifts: &[Shift],
    granularity_minutes: i64,
) -> Result<Vec<NaiveDateTime>, EngineError> {
    if !(MIN_GRANULARITY_MINUTES..=MAX_GRANULARITY_MINUTES).contains(&granularity_minutes) {
        return Err(EngineError::InvalidGranularity(granularity_minutes));
    }
    if shifts.len() > MAX_SHIFTS_PER_DAY {
        return Err(EngineError::LimitExceeded("too many shifts in one day"));
    }

    let step = Duration::minutes(granularity_minutes);
    let mut candidates = Vec::new();
    for shift in shifts {
        let end = day.and_time(shift.end);
        let mut current = day.and_time(shift.start);
        while current + step <= end {
            if candidates.len() == MAX_SLOTS_PER_QUERY {
                return Err(EngineError::LimitExceeded("slot grid too large"));
            }
            candidates.push(current);
            current += step;
        }
    }

    candidates.sort_unstable();
    candidates.dedup();
    Ok(candidates)
}
