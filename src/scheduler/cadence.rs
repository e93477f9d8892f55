use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Fires on every multiple of the interval since the Unix epoch, so a
/// 60-second cadence lands on the top of each minute.
#[derive(Debug, Clone, Copy)]
pub struct IntervalCadence {
    interval_secs: i64,
}

impl IntervalCadence {
    /// Intervals below one second are raised to one second.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let interval_secs = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX).max(1);
        Self { interval_secs }
    }

    /// The first boundary strictly after `now`.
    #[must_use]
    pub fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next = (now.timestamp().div_euclid(self.interval_secs) + 1) * self.interval_secs;
        DateTime::from_timestamp(next, 0)
            .unwrap_or_else(|| now + TimeDelta::seconds(self.interval_secs))
    }
}

pub(crate) fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
