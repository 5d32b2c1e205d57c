//! Monthly rebalance schedule over a trading calendar.

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// Fires on the n-th trading session of each calendar month.
///
/// `monthday = 1` is the first session, `2` the second, `-1` the last.
/// A month with fewer sessions than `|monthday|` fires on its last
/// (positive `monthday`) or first (negative) session instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlySchedule {
    monthday: i32,
}

impl MonthlySchedule {
    pub fn new(monthday: i32) -> Result<Self> {
        if monthday == 0 {
            return Err(Error::Config("monthday must be non-zero".into()));
        }
        Ok(Self { monthday })
    }

    pub fn first_trading_day() -> Self {
        Self { monthday: 1 }
    }

    pub fn monthday(&self) -> i32 {
        self.monthday
    }

    /// Rebalance dates in `calendar`, which must be sorted ascending.
    pub fn due_dates(&self, calendar: &[NaiveDate]) -> Vec<NaiveDate> {
        calendar
            .chunk_by(|a, b| (a.year(), a.month()) == (b.year(), b.month()))
            .map(|month| {
                let n = month.len();
                let idx = if self.monthday > 0 {
                    (self.monthday as usize).min(n) - 1
                } else {
                    n.saturating_sub(self.monthday.unsigned_abs() as usize)
                };
                month[idx]
            })
            .collect()
    }

    /// True if `date` is a rebalance date of `calendar`.
    pub fn is_due(&self, calendar: &[NaiveDate], date: NaiveDate) -> bool {
        let month: Vec<NaiveDate> = calendar
            .iter()
            .copied()
            .filter(|d| (d.year(), d.month()) == (date.year(), date.month()))
            .collect();
        self.due_dates(&month).first() == Some(&date)
    }
}

impl Default for MonthlySchedule {
    fn default() -> Self {
        Self::first_trading_day()
    }
}
