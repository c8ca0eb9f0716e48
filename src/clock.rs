//! Time source used for timestamps and "today" lookups.

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::cell::Cell;

/// Supplies the current instant and the caller's local calendar date.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Today's date in the local time zone.
    fn today(&self) -> NaiveDate;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen at a given instant and date, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self { now, today }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

/// A clock that advances by a fixed step every time `now` is read.
///
/// Lets tests create entries with strictly increasing timestamps.
#[derive(Debug)]
pub struct TickingClock {
    next: Cell<DateTime<Utc>>,
    step: Duration,
    today: NaiveDate,
}

impl TickingClock {
    pub fn new(start: DateTime<Utc>, step: Duration, today: NaiveDate) -> Self {
        Self {
            next: Cell::new(start),
            step,
            today,
        }
    }
}

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Utc> {
        let current = self.next.get();
        self.next.set(current + self.step);
        current
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
