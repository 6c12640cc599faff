use crate::model::{CandidateSlot, SlotStatus};

/// Flag free slots sitting within `ceil(duration / granularity)` grid
/// steps of a non-free slot, on either side. Distance is measured in
/// candidate indexes, not wall clock, so a gap in the grid (a shift
/// break) shortens the reach.
///
/// Only slots that were non-free before this pass act as sources; a
/// freshly flagged free slot never propagates. Non-free slots keep
/// `warning = false`.
pub fn mark_warnings(slots: &mut [CandidateSlot], duration_minutes: i64, granularity_minutes: i64) {
    if slots.is_empty() || duration_minutes <= 0 || granularity_minutes <= 0 {
        return;
    }
    let steps = ((duration_minutes + granularity_minutes - 1) / granularity_minutes) as usize;
    let n = slots.len();
    for i in 0..n {
        if slots[i].status == SlotStatus::Free {
            continue;
        }
        let lo = i.saturating_sub(steps);
        let hi = (i + steps).min(n - 1);
        for slot in &mut slots[lo..=hi] {
            if slot.status == SlotStatus::Free {
                slot.warning = true;
            }
        }
    }
}
