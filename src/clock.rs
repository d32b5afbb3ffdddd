//! Injectable wall-clock source.
//!
//! Rate windows, sync throttles and lazy expiry all compare against "now";
//! routing every read through this trait lets tests drive time manually
//! instead of sleeping.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Unix seconds, the unit chain timestamps use.
    fn now_ts(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock driven by hand.
#[cfg(test)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: parking_lot::Mutex::new(now),
        }
    }

    pub fn at_ts(ts: i64) -> Self {
        Self::at(DateTime::from_timestamp(ts, 0).expect("valid timestamp"))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock();
        *now += chrono::Duration::seconds(secs);
    }

    pub fn set_ts(&self, ts: i64) {
        let mut now = self.now.lock();
        *now = DateTime::from_timestamp(ts, 0).expect("valid timestamp");
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
