use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// A canonical Monday→Sunday week: `start` is a Monday at 00:00:00.000,
/// `end` is the following Sunday at 23:59:59.999.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WeekWindow {
    fn from_monday(monday: NaiveDate) -> Self {
        WeekWindow {
            start: monday.and_time(NaiveTime::MIN),
            end: end_of_day(monday + Duration::days(6)),
        }
    }

    #[must_use]
    pub fn start_day(&self) -> NaiveDate {
        self.start.date()
    }

    #[must_use]
    pub fn end_day(&self) -> NaiveDate {
        self.end.date()
    }
}

/// Day-granularity lookup key for stored week records. Tasks and reflections
/// are stored with start-of-day instants, but lookups may happen at any time
/// of day, so records are matched by the calendar day of their week start —
/// or, on the Sunday branch, their week end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKey {
    Start(NaiveDate),
    End(NaiveDate),
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .expect("23:59:59.999 is a valid time of day")
}

/// The open, editable week for task entry.
///
/// Sunday is the single special case: it belongs to the week that is ending,
/// so on a Sunday the current week starts the next day. Monday–Saturday all
/// share one formula — the Monday of the calendar week containing `today`.
#[must_use]
pub fn current_week(today: NaiveDate) -> WeekWindow {
    let monday = if today.weekday() == Weekday::Sun {
        today + Duration::days(1)
    } else {
        today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
    };
    WeekWindow::from_monday(monday)
}

/// The just-ended week eligible for reflection.
///
/// On a Sunday the previous week is the one ending that same day (start six
/// days back, end at end-of-day today); otherwise it is the current week
/// shifted back seven days.
#[must_use]
pub fn previous_week(today: NaiveDate) -> WeekWindow {
    let monday = if today.weekday() == Weekday::Sun {
        today - Duration::days(6)
    } else {
        current_week(today).start_day() - Duration::days(7)
    };
    WeekWindow::from_monday(monday)
}

/// Lookup key for the current-week task record.
#[must_use]
pub fn current_week_key(today: NaiveDate) -> WindowKey {
    WindowKey::Start(current_week(today).start_day())
}

/// Lookup key for previous-week records. On a Sunday, stored records for the
/// week ending today are matched by their week-END day (their week start lies
/// six days back); every other weekday matches by week-start day.
#[must_use]
pub fn previous_week_key(today: NaiveDate) -> WindowKey {
    let window = previous_week(today);
    if today.weekday() == Weekday::Sun {
        WindowKey::End(window.end_day())
    } else {
        WindowKey::Start(window.start_day())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2024-06-10 is a Monday; 2024-06-16 is a Sunday.

    #[test]
    fn current_week_on_monday() {
        let w = current_week(date(2024, 6, 10));
        assert_eq!(w.start_day(), date(2024, 6, 10));
        assert_eq!(w.end_day(), date(2024, 6, 16));
    }

    #[test]
    fn current_week_midweek() {
        // Wednesday and Saturday resolve to the same Monday
        let wed = current_week(date(2024, 6, 12));
        let sat = current_week(date(2024, 6, 15));
        assert_eq!(wed.start_day(), date(2024, 6, 10));
        assert_eq!(wed, sat);
    }

    #[test]
    fn current_week_on_sunday_starts_next_day() {
        let w = current_week(date(2024, 6, 16));
        assert_eq!(w.start_day(), date(2024, 6, 17));
        assert_eq!(w.end_day(), date(2024, 6, 23));
    }

    #[test]
    fn window_boundaries_are_normalized() {
        let w = current_week(date(2024, 6, 12));
        assert_eq!(w.start.time(), NaiveTime::MIN);
        assert_eq!(
            w.end.time(),
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()
        );
        assert_eq!(w.end.date() - w.start.date(), Duration::days(6));
    }

    #[test]
    fn previous_week_midweek() {
        let w = previous_week(date(2024, 6, 12));
        assert_eq!(w.start_day(), date(2024, 6, 3));
        assert_eq!(w.end_day(), date(2024, 6, 9));
    }

    #[test]
    fn previous_week_on_sunday_ends_today() {
        let today = date(2024, 6, 16);
        let w = previous_week(today);
        assert_eq!(w.start_day(), date(2024, 6, 10));
        assert_eq!(w.end, end_of_day(today));
    }

    #[test]
    fn non_sunday_windows_are_adjacent_calendar_weeks() {
        for day in 10..=15 {
            // Monday through Saturday
            let today = date(2024, 6, day);
            let current = current_week(today);
            let previous = previous_week(today);
            assert_eq!(
                previous.start_day() + Duration::days(7),
                current.start_day(),
                "previous week must start one week boundary earlier on {today}"
            );
            assert_eq!(previous.end_day(), current.start_day() - Duration::days(1));
        }
    }

    #[test]
    fn sunday_windows_are_adjacent() {
        let today = date(2024, 6, 16);
        let current = current_week(today);
        let previous = previous_week(today);
        assert_eq!(previous.end_day(), today);
        assert_eq!(current.start_day(), today + Duration::days(1));
        assert!(previous.end < current.start);
    }

    #[test]
    fn windows_never_overlap() {
        // Sweep a few months of dates, covering month and year boundaries
        let mut today = date(2023, 12, 1);
        while today < date(2024, 3, 1) {
            let current = current_week(today);
            let previous = previous_week(today);
            assert!(
                previous.end < current.start,
                "overlap on {today}: prev ends {}, current starts {}",
                previous.end,
                current.start
            );
            today += Duration::days(1);
        }
    }

    #[test]
    fn current_week_start_is_monday_at_or_before_today() {
        for day in 10..=15 {
            let today = date(2024, 6, day);
            let w = current_week(today);
            assert_eq!(w.start_day().weekday(), Weekday::Mon);
            assert!(w.start_day() <= today);
            assert!(today <= w.end_day());
        }
    }

    #[test]
    fn windows_are_deterministic() {
        let today = date(2024, 6, 16);
        assert_eq!(current_week(today), current_week(today));
        assert_eq!(previous_week(today), previous_week(today));
    }

    #[test]
    fn previous_week_key_uses_start_day_midweek() {
        let key = previous_week_key(date(2024, 6, 12));
        assert_eq!(key, WindowKey::Start(date(2024, 6, 3)));
    }

    #[test]
    fn previous_week_key_uses_end_day_on_sunday() {
        let key = previous_week_key(date(2024, 6, 16));
        assert_eq!(key, WindowKey::End(date(2024, 6, 16)));
    }

    #[test]
    fn current_week_key_follows_current_window() {
        assert_eq!(
            current_week_key(date(2024, 6, 12)),
            WindowKey::Start(date(2024, 6, 10))
        );
        assert_eq!(
            current_week_key(date(2024, 6, 16)),
            WindowKey::Start(date(2024, 6, 17))
        );
    }

    #[test]
    fn year_boundary_week() {
        // 2024-12-30 is a Monday; the week spans into 2025
        let w = current_week(date(2024, 12, 31));
        assert_eq!(w.start_day(), date(2024, 12, 30));
        assert_eq!(w.end_day(), date(2025, 1, 5));

        // Sunday 2025-01-05: previous week reaches back into 2024
        let prev = previous_week(date(2025, 1, 5));
        assert_eq!(prev.start_day(), date(2024, 12, 30));
        assert_eq!(prev.end_day(), date(2025, 1, 5));
    }
}
