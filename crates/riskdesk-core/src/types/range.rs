//! Inclusive calendar date ranges.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// An inclusive range of calendar dates.
///
/// Construction validates ordering, so a `DateRange` in hand is always
/// well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a validated range. Fails fast on inverted ordering.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::Validation(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Check whether a date falls inside the range.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Check whether this range fully covers another.
    #[inline]
    pub fn covers(&self, other: &DateRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// Intersection with another range, if any.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateRange { start, end })
    }

    /// Whether two ranges overlap or touch on adjacent calendar days,
    /// i.e. their union is a single contiguous range.
    pub fn touches(&self, other: &DateRange) -> bool {
        let a = self.start.checked_sub_days(Days::new(1)).unwrap_or(self.start);
        let b = self.end.checked_add_days(Days::new(1)).unwrap_or(self.end);
        other.end >= a && other.start <= b
    }

    /// Union of two touching ranges. Caller guarantees [`Self::touches`].
    pub fn merge(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The parts of `self` not covered by any of `covered` (assumed sorted
    /// by start and non-overlapping). At most one gap opens per uncovered
    /// stretch; result is sorted.
    pub fn subtract(&self, covered: &[DateRange]) -> Vec<DateRange> {
        let mut gaps = Vec::new();
        let mut cursor = self.start;

        for c in covered {
            if c.end < cursor {
                continue;
            }
            if c.start > self.end {
                break;
            }
            if c.start > cursor {
                gaps.push(DateRange {
                    start: cursor,
                    end: c.start.pred_opt().unwrap_or(c.start),
                });
            }
            match c.end.succ_opt() {
                Some(next) if next > cursor => cursor = next,
                _ => {}
            }
            if cursor > self.end {
                return gaps;
            }
        }

        if cursor <= self.end {
            gaps.push(DateRange {
                start: cursor,
                end: self.end,
            });
        }
        gaps
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
