//! Working-day calendars and the per-task plot map.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Whether a date falls Monday through Friday.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The earliest weekday at or after `date`.
pub fn next_working_day(date: NaiveDate) -> NaiveDate {
    let mut current = date;
    while !is_weekday(current) {
        match current.succ_opt() {
            Some(next) => current = next,
            None => return current,
        }
    }
    current
}

/// Count weekdays in `[start, end]` inclusive. Zero when `start > end`.
pub fn weekdays_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut count = 0;
    let mut current = start;
    while current <= end {
        if is_weekday(current) {
            count += 1;
        }
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    count
}

/// A sparse per-task plot map of scheduled working days.
///
/// Ordered mapping from date to "is a scheduled working day". Entries are
/// scoped to the owning task's planned date range; a date not present is
/// non-working for value-accrual purposes. Built once when the task is
/// created and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingDayPlan {
    days: BTreeMap<NaiveDate, bool>,
}

impl WorkingDayPlan {
    /// Plot every weekday in `[start, end]` inclusive as a working day.
    ///
    /// This is the standard plan shape for a task scheduled on a plain
    /// Mon-Fri calendar.
    pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Self {
        let mut days = BTreeMap::new();
        let mut current = start;
        while current <= end {
            if is_weekday(current) {
                days.insert(current, true);
            }
            current = match current.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Self { days }
    }

    /// Build a plan from explicit (date, working) entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (NaiveDate, bool)>) -> Self {
        Self {
            days: entries.into_iter().collect(),
        }
    }

    /// Whether `date` is plotted as a working day. Absent dates are not.
    pub fn is_working(&self, date: NaiveDate) -> bool {
        self.days.get(&date).copied().unwrap_or(false)
    }

    /// Plotted working days in ascending date order.
    pub fn working_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days
            .iter()
            .filter(|(_, working)| **working)
            .map(|(date, _)| *date)
    }

    /// Number of entries in the plot map (working or not).
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether the plot map has no entries.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekdays_plan_skips_weekend() {
        // 2024-03-04 is a Monday; the range spans the following weekend.
        let plan = WorkingDayPlan::weekdays(date(2024, 3, 4), date(2024, 3, 12));
        assert_eq!(plan.working_days().count(), 7);
        assert!(plan.is_working(date(2024, 3, 8)));
        assert!(!plan.is_working(date(2024, 3, 9)));
        assert!(!plan.is_working(date(2024, 3, 10)));
        assert!(plan.is_working(date(2024, 3, 11)));
    }

    #[test]
    fn absent_date_is_not_working() {
        let plan = WorkingDayPlan::weekdays(date(2024, 3, 4), date(2024, 3, 8));
        assert!(!plan.is_working(date(2024, 3, 1)));
        assert!(!plan.is_working(date(2024, 3, 11)));
    }

    #[test]
    fn explicit_entries_override_nothing_else() {
        let plan = WorkingDayPlan::from_entries([
            (date(2024, 3, 4), true),
            (date(2024, 3, 5), false),
        ]);
        assert!(plan.is_working(date(2024, 3, 4)));
        assert!(!plan.is_working(date(2024, 3, 5)));
        assert_eq!(plan.working_days().count(), 1);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn next_working_day_skips_saturday_and_sunday() {
        assert_eq!(next_working_day(date(2024, 3, 9)), date(2024, 3, 11));
        assert_eq!(next_working_day(date(2024, 3, 10)), date(2024, 3, 11));
        assert_eq!(next_working_day(date(2024, 3, 11)), date(2024, 3, 11));
    }

    #[test]
    fn weekdays_between_is_inclusive() {
        assert_eq!(weekdays_between(date(2024, 3, 4), date(2024, 3, 8)), 5);
        assert_eq!(weekdays_between(date(2024, 3, 4), date(2024, 3, 11)), 6);
        assert_eq!(weekdays_between(date(2024, 3, 8), date(2024, 3, 4)), 0);
    }
}
