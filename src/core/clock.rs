use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;

use super::timezone::TimezoneConverter;

/// Time source for due-date comparisons
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current business date (IST)
    fn today(&self) -> NaiveDate {
        TimezoneConverter::business_date(self.now())
    }
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock pinned to 09:00 IST on the given business date
    pub fn at_date(date: NaiveDate) -> Self {
        let nine_ist = date
            .and_hms_opt(3, 30, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(Utc::now);
        Self::new(nine_ist)
    }

    /// Move to 09:00 IST on `date`
    pub fn set_date(&self, date: NaiveDate) {
        self.set(Self::at_date(date).now());
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|e| *e.into_inner())
    }
}
