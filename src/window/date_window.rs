//! Inclusive calendar-date intervals
//!
//! A [`DateWindow`] scopes one search predicate (`created:<start>..<end>`).
//! Windows are produced two ways: in fixed-size steps across the configured
//! range by [`TopLevelWindows`], and by bisection in the partitioner.

use crate::HarvestError;
use chrono::{Duration, NaiveDate};
use std::fmt;

/// A contiguous, inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Creates a window covering `start..=end`
    ///
    /// # Returns
    ///
    /// * `Ok(DateWindow)` - The window
    /// * `Err(HarvestError::InvalidWindow)` - `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, HarvestError> {
        if start > end {
            return Err(HarvestError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a window covering exactly one day
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// First day of the window
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window (inclusive)
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, always at least 1
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Splits the window into two adjacent halves
    ///
    /// With `span = end - start`, the midpoint is `start + span / 2`. The left
    /// half ends the day before the midpoint (or on `start` when the midpoint
    /// is `start` itself) and the right half begins the day after the left
    /// half ends. Both halves are strictly shorter than the window and together
    /// cover it exactly once.
    ///
    /// Returns `None` for a single-day window, which cannot be split.
    pub fn bisect(&self) -> Option<(DateWindow, DateWindow)> {
        let span = (self.end - self.start).num_days();
        if span == 0 {
            return None;
        }

        let left_len = (span / 2 - 1).max(0);
        let left_end = self.start + Duration::days(left_len);
        let right_start = left_end + Duration::days(1);

        Some((
            DateWindow {
                start: self.start,
                end: left_end,
            },
            DateWindow {
                start: right_start,
                end: self.end,
            },
        ))
    }

    /// Iterates every day of the window in order
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

impl fmt::Display for DateWindow {
    /// Formats as the search API's range syntax: `2020-01-01..2020-06-30`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Fixed-size windows stepping across a date range
///
/// Each window spans `days` days; the last one is clipped to `finish`. The next
/// window always starts the day after the previous one ended.
#[derive(Debug, Clone)]
pub struct TopLevelWindows {
    next_start: Option<NaiveDate>,
    finish: NaiveDate,
    days: i64,
}

impl TopLevelWindows {
    pub fn new(start: NaiveDate, finish: NaiveDate, days: u32) -> Self {
        Self {
            next_start: Some(start),
            finish,
            days: i64::from(days.max(1)),
        }
    }
}

impl Iterator for TopLevelWindows {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        let start = self.next_start?;
        if start > self.finish {
            self.next_start = None;
            return None;
        }

        let end = (start + Duration::days(self.days - 1)).min(self.finish);
        self.next_start = end.succ_opt();

        Some(DateWindow { start, end })
    }
}
