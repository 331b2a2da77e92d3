//! Calendar-date arithmetic.
//!
//! Everything here works on [`NaiveDate`] values: no time of day, no zone, so
//! weekday matching and day counting cannot drift across DST or UTC offsets.

use chrono::{Datelike, NaiveDate};
use std::iter::FusedIterator;

use crate::error::CoreError;
use crate::models::DayOfWeek;

/// Whole days from `a` to `b`; negative when `b` is before `a`.
#[inline]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    b.signed_duration_since(a).num_days()
}

/// Weekday token of `date`, Monday = 0 through Sunday = 6.
#[inline]
pub fn weekday_of(date: NaiveDate) -> DayOfWeek {
    date.weekday().into()
}

/// Inclusive, lazily evaluated date range.
///
/// Cloning yields an independent iterator from the current position, so a
/// range can be restarted by keeping an unconsumed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

impl DateRange {
    pub fn start(&self) -> Option<NaiveDate> {
        self.next
    }

    pub fn end(&self) -> NaiveDate {
        self.last
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.last { current.succ_opt() } else { None };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = match self.next {
            Some(next) => (days_between(next, self.last) + 1) as usize,
            None => 0,
        };
        (len, Some(len))
    }
}

impl DoubleEndedIterator for DateRange {
    fn next_back(&mut self) -> Option<NaiveDate> {
        let first = self.next?;
        let current = self.last;
        if current <= first {
            self.next = None;
        } else {
            // current > first, so a predecessor always exists
            self.last = current.pred_opt().unwrap_or(first);
        }
        Some(current)
    }
}

impl ExactSizeIterator for DateRange {}

impl FusedIterator for DateRange {}

/// Iterates `start..=end`. Fails with [`CoreError::InvalidRange`] when `end < start`.
pub fn iterate_dates(start: NaiveDate, end: NaiveDate) -> Result<DateRange, CoreError> {
    if end < start {
        return Err(CoreError::InvalidRange { start, end });
    }
    Ok(DateRange { next: Some(start), last: end })
}

/// Intersection of an inclusive range with a window whose end may be open.
/// `None` when they do not overlap.
pub fn intersect(
    range: (NaiveDate, NaiveDate),
    window_start: NaiveDate,
    window_end: Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = range.0.max(window_start);
    let end = match window_end {
        Some(window_end) => range.1.min(window_end),
        None => range.1,
    };
    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_between_signed() {
        assert_eq!(days_between(date(2024, 1, 1), date(2024, 1, 10)), 9);
        assert_eq!(days_between(date(2024, 1, 10), date(2024, 1, 1)), -9);
        assert_eq!(days_between(date(2024, 2, 28), date(2024, 3, 1)), 2); // leap year
        assert_eq!(days_between(date(2023, 12, 31), date(2024, 1, 1)), 1);
    }

    #[test]
    fn test_weekday_of_known_dates() {
        assert_eq!(weekday_of(date(2024, 1, 1)), DayOfWeek::Mon);
        assert_eq!(weekday_of(date(2024, 1, 7)), DayOfWeek::Sun);
        assert_eq!(weekday_of(date(2024, 2, 29)), DayOfWeek::Thu);
    }

    #[test]
    fn test_iterate_dates_inclusive_across_month_end() {
        let dates: Vec<_> = iterate_dates(date(2024, 1, 30), date(2024, 2, 2)).unwrap().collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 30), date(2024, 1, 31), date(2024, 2, 1), date(2024, 2, 2)]
        );
    }

    #[test]
    fn test_iterate_single_day() {
        let range = iterate_dates(date(2024, 5, 5), date(2024, 5, 5)).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.collect::<Vec<_>>(), vec![date(2024, 5, 5)]);
    }

    #[test]
    fn test_iterate_rejects_reversed_range() {
        let result = iterate_dates(date(2024, 1, 2), date(2024, 1, 1));
        assert!(matches!(result, Err(CoreError::InvalidRange { .. })));
    }

    #[test]
    fn test_range_is_restartable() {
        let range = iterate_dates(date(2024, 1, 1), date(2024, 1, 5)).unwrap();
        let first: Vec<_> = range.clone().collect();
        let second: Vec<_> = range.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_range_double_ended() {
        let mut range = iterate_dates(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        assert_eq!(range.next_back(), Some(date(2024, 1, 3)));
        assert_eq!(range.next(), Some(date(2024, 1, 1)));
        assert_eq!(range.len(), 1);
        assert_eq!(range.next_back(), Some(date(2024, 1, 2)));
        assert_eq!(range.next(), None);
        assert_eq!(range.next_back(), None);
    }

    #[test]
    fn test_intersect() {
        let range = (date(2024, 1, 1), date(2024, 1, 10));
        assert_eq!(
            intersect(range, date(2024, 1, 5), None),
            Some((date(2024, 1, 5), date(2024, 1, 10)))
        );
        assert_eq!(
            intersect(range, date(2023, 1, 1), Some(date(2024, 1, 3))),
            Some((date(2024, 1, 1), date(2024, 1, 3)))
        );
        assert_eq!(intersect(range, date(2024, 1, 11), None), None);
        assert_eq!(intersect(range, date(2023, 1, 1), Some(date(2023, 12, 31))), None);
    }
}
