//! Wall-clock capability injected into the entry store.
//!
//! # Responsibility
//! - Provide "today" as a local-calendar `DayKey` and "now" as epoch millis.
//! - Allow deterministic clocks in tests.

use crate::model::entry::DayKey;
use chrono::{Local, NaiveDate};

/// Time source used when stamping entries.
pub trait Clock: Send + Sync {
    /// Current local calendar day.
    fn today(&self) -> DayKey;
    /// Current instant in Unix epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

/// Clock backed by the system local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> DayKey {
        DayKey::from_date(Local::now().date_naive())
    }

    fn now_epoch_ms(&self) -> i64 {
        Local::now().timestamp_millis()
    }
}

/// Clock frozen at one day and instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    today: DayKey,
    now_epoch_ms: i64,
}

impl FixedClock {
    pub fn new(today: DayKey, now_epoch_ms: i64) -> Self {
        Self {
            today,
            now_epoch_ms,
        }
    }

    /// Builds a clock whose "now" is midnight UTC of `date`.
    pub fn on(date: NaiveDate) -> Self {
        let now_epoch_ms = date
            .and_hms_opt(0, 0, 0)
            .map_or(0, |midnight| midnight.and_utc().timestamp_millis());
        Self::new(DayKey::from_date(date), now_epoch_ms)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> DayKey {
        self.today.clone()
    }

    fn now_epoch_ms(&self) -> i64 {
        self.now_epoch_ms
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, SystemClock};
    use chrono::{Local, NaiveDate};

    #[test]
    fn system_clock_today_matches_local_date() {
        let before = Local::now().date_naive();
        let today = SystemClock.today();
        let after = Local::now().date_naive();
        let candidates = [before.to_string(), after.to_string()];
        assert!(candidates.iter().any(|day| day == today.as_str()));
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(clock.today().as_str(), "2024-01-05");
        assert_eq!(clock.now_epoch_ms(), clock.now_epoch_ms());
    }
}
