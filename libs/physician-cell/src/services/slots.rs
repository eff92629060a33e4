use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, Utc};

use shared_config::{PastSlotPolicy, SchedulingPolicy};

use crate::models::AvailabilityWindow;

/// Slot identifiers used in booking URLs, e.g. `2025-06-02-09-30`.
pub const SLOT_FORMAT: &str = "%Y-%m-%d-%H-%M";

pub fn format_slot(slot: &DateTime<Utc>) -> String {
    slot.format(SLOT_FORMAT).to_string()
}

pub fn parse_slot(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SLOT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn iso_weekday(date: NaiveDate) -> u8 {
    // number_from_monday is always 1..=7
    date.weekday().number_from_monday() as u8
}

fn step(policy: &SchedulingPolicy) -> Duration {
    Duration::minutes(i64::from(policy.step_minutes()))
}

/// Enumerates the bookable slot starts for `policy.horizon_days` days from `from_date`.
///
/// Windows are walked in weekday/start-time order inside each day and days in
/// calendar order. The result is not re-sorted, so overlapping windows can yield
/// out-of-order timestamps; a timestamp is never emitted twice. Booked
/// timestamps are skipped, and with `PastSlotPolicy::Exclude` so is anything
/// before `now`.
pub fn compute_slots(
    windows: &[AvailabilityWindow],
    booked: &HashSet<DateTime<Utc>>,
    from_date: NaiveDate,
    now: DateTime<Utc>,
    policy: &SchedulingPolicy,
) -> Vec<DateTime<Utc>> {
    let mut ordered: Vec<&AvailabilityWindow> = windows.iter().collect();
    ordered.sort_by_key(|w| (w.weekday, w.start_time));

    let step = step(policy);
    let mut emitted = HashSet::new();
    let mut slots = Vec::new();

    for offset in 0..policy.horizon_days {
        let Some(date) = from_date.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        let weekday = iso_weekday(date);

        for window in ordered.iter().filter(|w| w.weekday == weekday) {
            let end = date.and_time(window.end_time).and_utc();
            let mut slot = date.and_time(window.start_time).and_utc();

            while slot < end {
                let past = policy.past_slots == PastSlotPolicy::Exclude && slot < now;
                if !past && !booked.contains(&slot) && emitted.insert(slot) {
                    slots.push(slot);
                }
                slot += step;
            }
        }
    }

    slots
}

/// True when some window generates a slot starting exactly at `at`.
pub fn is_slot_start(
    windows: &[AvailabilityWindow],
    at: DateTime<Utc>,
    policy: &SchedulingPolicy,
) -> bool {
    let date = at.date_naive();
    let weekday = iso_weekday(date);
    let step = step(policy);

    windows.iter().filter(|w| w.weekday == weekday).any(|window| {
        let start = date.and_time(window.start_time).and_utc();
        let end = date.and_time(window.end_time).and_utc();
        if at < start || at >= end {
            return false;
        }
        let elapsed = at - start;
        elapsed.num_seconds() % step.num_seconds() == 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use uuid::Uuid;

    // 2025-06-02 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, minute, 0).unwrap()
    }

    fn window(weekday: u8, start: (u32, u32), end: (u32, u32)) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            physician_id: Uuid::nil(),
            weekday,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn policy() -> SchedulingPolicy {
        SchedulingPolicy::default()
    }

    #[test]
    fn no_windows_means_no_slots() {
        let slots = compute_slots(&[], &HashSet::new(), monday(), at(2, 8, 0), &policy());
        assert!(slots.is_empty());
    }

    #[test]
    fn empty_window_yields_nothing() {
        let windows = [window(1, (9, 0), (9, 0))];
        let slots = compute_slots(&windows, &HashSet::new(), monday(), at(2, 8, 0), &policy());
        assert!(slots.is_empty());
    }

    #[test]
    fn one_hour_window_yields_two_slots() {
        let windows = [window(1, (9, 0), (10, 0))];
        let slots = compute_slots(&windows, &HashSet::new(), monday(), at(2, 8, 0), &policy());
        assert_eq!(slots, vec![at(2, 9, 0), at(2, 9, 30)]);
    }

    #[test]
    fn booked_slot_is_skipped() {
        let windows = [window(1, (9, 0), (10, 0))];
        let booked = HashSet::from([at(2, 9, 0)]);
        let slots = compute_slots(&windows, &booked, monday(), at(2, 8, 0), &policy());
        assert_eq!(slots, vec![at(2, 9, 30)]);
    }

    #[test]
    fn partial_step_at_window_end_still_starts_a_slot() {
        let windows = [window(1, (9, 0), (9, 45))];
        let slots = compute_slots(&windows, &HashSet::new(), monday(), at(2, 8, 0), &policy());
        assert_eq!(slots, vec![at(2, 9, 0), at(2, 9, 30)]);
    }

    #[test]
    fn days_are_walked_from_the_reference_date() {
        // Wednesday first, Monday comes round again on the 9th
        let windows = [window(1, (9, 0), (9, 30)), window(3, (14, 0), (14, 30))];
        let wednesday = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        let slots = compute_slots(&windows, &HashSet::new(), wednesday, at(4, 8, 0), &policy());
        assert_eq!(slots, vec![at(4, 14, 0), at(9, 9, 0)]);
    }

    #[test]
    fn overlapping_windows_are_not_resorted() {
        let windows = [window(1, (9, 15), (10, 15)), window(1, (9, 0), (10, 0))];
        let slots = compute_slots(&windows, &HashSet::new(), monday(), at(2, 8, 0), &policy());
        assert_eq!(
            slots,
            vec![at(2, 9, 0), at(2, 9, 30), at(2, 9, 15), at(2, 9, 45)]
        );
    }

    #[test]
    fn duplicate_windows_never_repeat_a_slot() {
        let windows = [window(1, (9, 0), (10, 0)), window(1, (9, 0), (10, 0))];
        let slots = compute_slots(&windows, &HashSet::new(), monday(), at(2, 8, 0), &policy());
        assert_eq!(slots, vec![at(2, 9, 0), at(2, 9, 30)]);
    }

    #[test]
    fn past_slots_follow_policy() {
        let windows = [window(1, (9, 0), (10, 0))];
        let now = at(2, 9, 10);

        let included = compute_slots(&windows, &HashSet::new(), monday(), now, &policy());
        assert_eq!(included, vec![at(2, 9, 0), at(2, 9, 30)]);

        let exclude = SchedulingPolicy {
            past_slots: PastSlotPolicy::Exclude,
            ..policy()
        };
        let excluded = compute_slots(&windows, &HashSet::new(), monday(), now, &exclude);
        assert_eq!(excluded, vec![at(2, 9, 30)]);
    }

    #[test]
    fn horizon_bounds_the_walk() {
        let windows = [window(1, (9, 0), (9, 30))];
        let two_weeks = SchedulingPolicy {
            horizon_days: 14,
            ..policy()
        };
        let slots = compute_slots(&windows, &HashSet::new(), monday(), at(2, 8, 0), &two_weeks);
        assert_eq!(slots, vec![at(2, 9, 0), at(9, 9, 0)]);
    }

    #[test]
    fn resolution_is_repeatable() {
        let windows = [window(1, (9, 0), (12, 0)), window(5, (13, 0), (15, 0))];
        let booked = HashSet::from([at(2, 10, 0), at(6, 14, 30)]);
        let first = compute_slots(&windows, &booked, monday(), at(2, 8, 0), &policy());
        let second = compute_slots(&windows, &booked, monday(), at(2, 8, 0), &policy());
        assert_eq!(first, second);
    }

    #[test]
    fn slot_start_must_align_with_a_window() {
        let windows = [window(1, (9, 0), (10, 0))];
        assert!(is_slot_start(&windows, at(2, 9, 30), &policy()));
        assert!(!is_slot_start(&windows, at(2, 9, 15), &policy()));
        assert!(!is_slot_start(&windows, at(2, 10, 0), &policy()));
        assert!(!is_slot_start(&windows, at(3, 9, 0), &policy()));
    }

    #[test]
    fn slot_strings() {
        assert_eq!(parse_slot("2025-06-02-09-30"), Some(at(2, 9, 30)));
        assert_eq!(format_slot(&at(2, 9, 30)), "2025-06-02-09-30");
        assert_eq!(parse_slot("2025-06-02 09:30"), None);
        assert_eq!(parse_slot("2025-13-02-09-30"), None);
    }
}
