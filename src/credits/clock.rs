//! Sources of "today" for daily quota resets.

use chrono::{Days, Local, NaiveDate};
use std::sync::{Mutex, PoisonError};

/// Supplies the current calendar day.
pub trait Clock: Send + Sync {
    /// The calendar day that daily usage is counted against.
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the local time zone of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    day: Mutex<NaiveDate>,
}

impl ManualClock {
    /// Creates a clock stopped at `day`.
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(day),
        }
    }

    /// Moves the clock to `day`.
    pub fn set(&self, day: NaiveDate) {
        *self.day.lock().unwrap_or_else(PoisonError::into_inner) = day;
    }

    /// Moves the clock forward by `days` calendar days.
    pub fn advance_days(&self, days: u64) {
        let mut day = self.day.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = day.checked_add_days(Days::new(days)) {
            *day = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.day.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
