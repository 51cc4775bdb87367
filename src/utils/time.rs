/// Clock abstraction and trailing time windows
use std::num::NonZeroU32;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of wall-clock time, injectable so expiry and windowing are testable
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Trailing interval ending at the moment it was taken.
///
/// Only `start` is enforced by [`TimeWindow::admits`]; `end` is recorded but
/// points after it are not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of `minutes` ending at `now`.
    ///
    /// Callers validate `minutes` at the boundary; a zero or missing window
    /// never reaches this point.
    pub fn trailing(now: DateTime<Utc>, minutes: NonZeroU32) -> Self {
        TimeWindow {
            start: now - Duration::minutes(i64::from(minutes.get())),
            end: now,
        }
    }

    /// Whether `ts` is at or after the window start
    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start
    }
}

/// Take the trailing window of `minutes` from `clock`
pub fn time_window(clock: &dyn Clock, minutes: NonZeroU32) -> TimeWindow {
    TimeWindow::trailing(clock.now(), minutes)
}
