use chrono::{NaiveDate, Utc};
use std::fmt;

/// An inclusive range of calendar days queried from the provider in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Creates a window covering `start..=end`. Returns `None` if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// A window covering exactly one day.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The current UTC day. Used whenever the caller does not pass a window.
    pub fn today() -> Self {
        Self::single(Utc::now().date_naive())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::today()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_are_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 4, 3).unwrap();
        let window = DateWindow::new(start, end).unwrap();
        assert_eq!(window.start(), start);
        assert_eq!(window.end(), end);
        assert_eq!(window.to_string(), "2025-04-01..=2025-04-03");
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2025, 4, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert!(DateWindow::new(start, end).is_none());
    }

    #[test]
    fn test_default_is_a_single_day() {
        let window = DateWindow::default();
        assert_eq!(window.start(), window.end());
    }
}
