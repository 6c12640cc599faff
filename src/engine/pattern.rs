use chrono::{Datelike, NaiveDate};

use crate::model::{Provider, Shift};

/// Shifts the provider works on the given day, in stored order.
///
/// An unconfigured weekday resolves to an empty slice, never an error.
/// Ordering and overlap of the stored shifts are not validated here; the
/// grid generator sorts and deduplicates downstream.
pub fn day_shifts(provider: &Provider, day: NaiveDate) -> &[Shift] {
    provider.pattern.shifts_for(day.weekday())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeeklyPattern;
    use chrono::{NaiveTime, Weekday};
    use std::collections::HashSet;
    use ulid::Ulid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn make_provider(pattern: WeeklyPattern) -> Provider {
        Provider {
            id: Ulid::new(),
            name: None,
            active: true,
            pattern,
            services: HashSet::new(),
        }
    }

    #[test]
    fn resolves_weekday_from_date() {
        let friday_shifts = vec![Shift::new(t(9, 0), t(17, 0))];
        let pattern = WeeklyPattern::default().with(Weekday::Fri, friday_shifts.clone());
        let provider = make_provider(pattern);

        // 2025-03-14 is a Friday
        let friday = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(day_shifts(&provider, friday), friday_shifts.as_slice());

        let saturday = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert!(day_shifts(&provider, saturday).is_empty());
    }

    #[test]
    fn preserves_stored_order() {
        let shifts = vec![
            Shift::new(t(13, 0), t(17, 0)),
            Shift::new(t(9, 0), t(12, 0)),
        ];
        let provider =
            make_provider(WeeklyPattern::default().with(Weekday::Mon, shifts.clone()));
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(day_shifts(&provider, monday), shifts.as_slice());
    }
}
