use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::model::{ProviderId, Reservation, ReservationEvent, ReservationId};

/// Local mirror of the booking store's reservations for one window.
///
/// The reducer is idempotent and tombstone-biased: re-applying a delivered
/// event changes nothing, and once an id is cancelled a later `Created`
/// for the same id cannot resurrect it. Both the push subscription and the
/// poll diff converge through `apply`; only a full re-fetch
/// (`replace_all`) takes the store's word wholesale.
#[derive(Debug, Clone, Default)]
pub struct ReservationSnapshot {
    by_id: HashMap<ReservationId, Reservation>,
}

impl ReservationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: ReservationId) -> Option<&Reservation> {
        self.by_id.get(&id)
    }

    /// Apply one event. Returns whether the snapshot changed.
    pub fn apply(&mut self, event: &ReservationEvent) -> bool {
        match event {
            ReservationEvent::Created(r) => match self.by_id.get(&r.id) {
                // Tombstones win over late or replayed creates
                Some(existing) if !existing.active => false,
                Some(existing) if existing == r => false,
                _ => {
                    self.by_id.insert(r.id, r.clone());
                    true
                }
            },
            ReservationEvent::Cancelled(r) => match self.by_id.get_mut(&r.id) {
                Some(existing) if !existing.active => false,
                Some(existing) => {
                    existing.active = false;
                    true
                }
                None => {
                    // Cancel for a row we never saw: keep the tombstone so
                    // the matching Created cannot land after it
                    let mut row = r.clone();
                    row.active = false;
                    self.by_id.insert(row.id, row);
                    true
                }
            },
        }
    }

    /// Replace the whole mirror with a freshly fetched listing.
    pub fn replace_all(&mut self, reservations: Vec<Reservation>) {
        self.by_id = reservations.into_iter().map(|r| (r.id, r)).collect();
    }

    /// Owned copy of every row, for callers that outlive the lock.
    pub fn all(&self) -> Vec<Reservation> {
        self.by_id.values().cloned().collect()
    }

    /// Owned copy of the rows touching one provider day.
    pub fn for_day(&self, provider_id: ProviderId, day: NaiveDate) -> Vec<Reservation> {
        self.by_id
            .values()
            .filter(|r| r.provider_id == provider_id && r.touches_day(day))
            .cloned()
            .collect()
    }
}

/// Events that would move `snapshot` toward `fresh`, for the poll producer.
///
/// Rows the store no longer lists but the mirror still holds active were
/// cancelled while we were not looking. Rows the mirror has tombstoned
/// stay tombstoned regardless of what the listing says, matching the
/// reducer's bias; a resync realigns those wholesale.
pub fn diff_snapshot(
    snapshot: &ReservationSnapshot,
    fresh: &[Reservation],
) -> Vec<ReservationEvent> {
    let mut events = Vec::new();
    let mut seen = HashSet::with_capacity(fresh.len());
    for row in fresh {
        seen.insert(row.id);
        match snapshot.get(row.id) {
            Some(existing) if !existing.active => {}
            Some(existing) if existing == row => {}
            _ => {
                if row.active {
                    events.push(ReservationEvent::Created(row.clone()));
                } else {
                    events.push(ReservationEvent::Cancelled(row.clone()));
                }
            }
        }
    }
    for existing in snapshot.by_id.values() {
        if existing.active && !seen.contains(&existing.id) {
            events.push(ReservationEvent::Cancelled(existing.clone()));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime, NaiveTime};
    use ulid::Ulid;

    fn start_at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
    }

    fn make_reservation(provider_id: ProviderId, h: u32) -> Reservation {
        Reservation {
            id: Ulid::new(),
            provider_id,
            service_id: Ulid::new(),
            start: start_at(h),
            end: start_at(h) + Duration::minutes(30),
            customer: None,
            active: true,
        }
    }

    #[test]
    fn apply_is_idempotent() {
        let mut snap = ReservationSnapshot::new();
        let r = make_reservation(Ulid::new(), 10);
        assert!(snap.apply(&ReservationEvent::Created(r.clone())));
        assert!(!snap.apply(&ReservationEvent::Created(r.clone())));
        assert_eq!(snap.len(), 1);

        assert!(snap.apply(&ReservationEvent::Cancelled(r.clone())));
        assert!(!snap.apply(&ReservationEvent::Cancelled(r)));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn cancellation_wins_over_late_create() {
        let mut snap = ReservationSnapshot::new();
        let r = make_reservation(Ulid::new(), 10);
        snap.apply(&ReservationEvent::Cancelled(r.clone()));
        assert!(!snap.apply(&ReservationEvent::Created(r.clone())));
        assert!(!snap.get(r.id).unwrap().active);
    }

    #[test]
    fn create_upserts_a_moved_reservation() {
        let mut snap = ReservationSnapshot::new();
        let mut r = make_reservation(Ulid::new(), 10);
        snap.apply(&ReservationEvent::Created(r.clone()));

        r.start = start_at(14);
        r.end = r.start + Duration::minutes(30);
        assert!(snap.apply(&ReservationEvent::Created(r.clone())));
        assert_eq!(snap.get(r.id).unwrap().start, start_at(14));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn replace_all_is_wholesale() {
        let mut snap = ReservationSnapshot::new();
        let pid = Ulid::new();
        let old = make_reservation(pid, 9);
        snap.apply(&ReservationEvent::Cancelled(old.clone()));

        let fresh = vec![make_reservation(pid, 11), old.clone()];
        snap.replace_all(fresh);
        assert_eq!(snap.len(), 2);
        // The tombstone was dropped; the store's listing is the truth now
        assert!(snap.get(old.id).unwrap().active);
    }

    #[test]
    fn for_day_filters_provider_and_day() {
        let mut snap = ReservationSnapshot::new();
        let pid = Ulid::new();
        let mine = make_reservation(pid, 10);
        let other_provider = make_reservation(Ulid::new(), 10);
        let mut other_day = make_reservation(pid, 10);
        other_day.start += Duration::days(1);
        other_day.end += Duration::days(1);
        for r in [&mine, &other_provider, &other_day] {
            snap.apply(&ReservationEvent::Created(r.clone()));
        }

        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let rows = snap.for_day(pid, day);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, mine.id);
    }

    #[test]
    fn diff_synthesizes_both_kinds() {
        let mut snap = ReservationSnapshot::new();
        let pid = Ulid::new();
        let kept = make_reservation(pid, 9);
        let vanished = make_reservation(pid, 10);
        snap.apply(&ReservationEvent::Created(kept.clone()));
        snap.apply(&ReservationEvent::Created(vanished.clone()));

        let added = make_reservation(pid, 11);
        let fresh = vec![kept.clone(), added.clone()];
        let events = diff_snapshot(&snap, &fresh);
        assert_eq!(events.len(), 2);
        assert!(events.contains(&ReservationEvent::Created(added.clone())));
        assert!(events.contains(&ReservationEvent::Cancelled(vanished.clone())));

        // Applying the diff converges the mirror
        for event in &events {
            snap.apply(event);
        }
        assert!(snap.get(added.id).unwrap().active);
        assert!(!snap.get(vanished.id).unwrap().active);
        assert!(snap.get(kept.id).unwrap().active);
    }

    #[test]
    fn diff_of_synced_state_is_empty() {
        let mut snap = ReservationSnapshot::new();
        let r = make_reservation(Ulid::new(), 10);
        snap.apply(&ReservationEvent::Created(r.clone()));
        assert!(diff_snapshot(&snap, &[r]).is_empty());
    }

    #[test]
    fn diff_respects_tombstones() {
        let mut snap = ReservationSnapshot::new();
        let r = make_reservation(Ulid::new(), 10);
        snap.apply(&ReservationEvent::Cancelled(r.clone()));
        // The listing still carries the row active; the tombstone holds
        assert!(diff_snapshot(&snap, &[r]).is_empty());
    }

    #[test]
    fn diff_tombstones_unknown_inactive_rows() {
        let snap = ReservationSnapshot::new();
        let mut r = make_reservation(Ulid::new(), 10);
        r.active = false;
        let events = diff_snapshot(&snap, &[r.clone()]);
        assert_eq!(events, vec![ReservationEvent::Cancelled(r)]);
    }
}
