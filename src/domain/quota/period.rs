//! Calendar month periods and the clock that selects them

use std::fmt::Debug;
use std::sync::RwLock;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A UTC calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl UsagePeriod {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

impl std::fmt::Display for UsagePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Source of "now" for period selection
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;

    fn current_period(&self) -> UsagePeriod {
        UsagePeriod::from_datetime(self.now())
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Clock pinned to the middle of the given month
    pub fn at_month(year: i32, month: u32) -> Self {
        let now = Utc
            .with_ymd_and_hms(year, month, 15, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self::new(now)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|guard| *guard).unwrap_or_else(|e| *e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_datetime_uses_utc_month() {
        let at = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(UsagePeriod::from_datetime(at), UsagePeriod::new(2025, 1));
    }

    #[test]
    fn test_fixed_clock_can_be_advanced() {
        let clock = FixedClock::at_month(2025, 1);
        assert_eq!(clock.current_period(), UsagePeriod::new(2025, 1));

        clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(clock.current_period(), UsagePeriod::new(2025, 2));
    }

    #[test]
    fn test_period_display() {
        assert_eq!(UsagePeriod::new(2025, 3).to_string(), "2025-03");
    }
}
