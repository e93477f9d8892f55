//! In-memory retry ledger.
//!
//! Each record moves Fresh → Retrying → Exhausted and back to Fresh either on
//! success or once the reset window has elapsed. State lives only for the
//! lifetime of the process.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::util::time::Clock;

pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_RESET_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub reset_after_days: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            reset_after_days: DEFAULT_RETRY_RESET_DAYS,
        }
    }
}

impl RetryPolicy {
    fn reset_after(self) -> Duration {
        Duration::days(i64::from(self.reset_after_days))
    }
}

/// Result of one processing attempt, as the ledger sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Success,
    Transient,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEntry {
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
    pub failed: bool,
}

/// What `record_attempt` did to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub attempts: u32,
    /// The entry moved into the exhausted state on this call.
    pub newly_exhausted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryEntryView {
    pub record_id: String,
    pub attempts: u32,
    pub last_attempt: String,
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrySummary {
    pub total_tracked: usize,
    pub waiting: usize,
    pub max_reached: usize,
    pub max_retry_attempts: u32,
    pub retry_reset_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryStatus {
    pub summary: RetrySummary,
    pub waiting: Vec<RetryEntryView>,
    pub max_reached: Vec<RetryEntryView>,
}

pub struct RetryLedger {
    entries: Mutex<HashMap<String, RetryEntry>>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RetryLedger {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
            clock,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RetryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the record may be processed now.
    ///
    /// An exhausted entry older than the reset window is dropped here, so the
    /// record comes back as fresh.
    pub fn can_retry(&self, record_id: &str) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get(record_id) else {
            return true;
        };

        if !entry.failed {
            return entry.attempts < self.policy.max_attempts;
        }

        if self.clock.now() - entry.last_attempt >= self.policy.reset_after() {
            entries.remove(record_id);
            info!(
                record_id,
                reset_after_days = self.policy.reset_after_days,
                "retry counter reset after cooldown"
            );
            return true;
        }

        false
    }

    pub fn record_attempt(&self, record_id: &str, attempt: Attempt) -> AttemptOutcome {
        let mut entries = self.lock();

        if attempt == Attempt::Success {
            if entries.remove(record_id).is_some() {
                info!(record_id, "record succeeded, retry history cleared");
            }
            return AttemptOutcome {
                attempts: 0,
                newly_exhausted: false,
            };
        }

        let now = self.clock.now();
        let max_attempts = self.policy.max_attempts;
        let entry = entries
            .entry(record_id.to_string())
            .or_insert_with(|| RetryEntry {
                attempts: 0,
                last_attempt: now,
                failed: false,
            });
        let was_failed = entry.failed;

        if attempt == Attempt::Permanent {
            entry.attempts = max_attempts;
        } else {
            entry.attempts = entry.attempts.saturating_add(1);
        }
        entry.last_attempt = now;
        if entry.attempts >= max_attempts {
            entry.failed = true;
        }

        let newly_exhausted = entry.failed && !was_failed;
        if newly_exhausted {
            warn!(
                record_id,
                attempts = entry.attempts,
                permanent = attempt == Attempt::Permanent,
                "record reached max retry attempts"
            );
        } else {
            info!(
                record_id,
                attempts = entry.attempts,
                max_attempts,
                "retry attempt recorded"
            );
        }

        AttemptOutcome {
            attempts: entry.attempts,
            newly_exhausted,
        }
    }

    /// Attempts recorded so far; zero for fresh records.
    pub fn attempts(&self, record_id: &str) -> u32 {
        self.lock().get(record_id).map_or(0, |entry| entry.attempts)
    }

    pub fn entry(&self, record_id: &str) -> Option<RetryEntry> {
        self.lock().get(record_id).cloned()
    }

    /// Operator reset of one record. Returns whether an entry existed.
    pub fn reset(&self, record_id: &str) -> bool {
        let removed = self.lock().remove(record_id).is_some();
        if removed {
            info!(record_id, "retry history reset by operator");
        }
        removed
    }

    /// Operator reset of every record. Returns how many entries were dropped.
    pub fn reset_all(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        info!(count, "all retry history reset by operator");
        count
    }

    pub fn status(&self) -> RetryStatus {
        let entries = self.lock();
        let mut waiting = Vec::new();
        let mut max_reached = Vec::new();

        for (record_id, entry) in entries.iter() {
            let view = RetryEntryView {
                record_id: record_id.clone(),
                attempts: entry.attempts,
                last_attempt: entry.last_attempt.to_rfc3339(),
                failed: entry.failed,
            };
            if entry.failed {
                max_reached.push(view);
            } else {
                waiting.push(view);
            }
        }
        waiting.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        max_reached.sort_by(|a, b| a.record_id.cmp(&b.record_id));

        RetryStatus {
            summary: RetrySummary {
                total_tracked: entries.len(),
                waiting: waiting.len(),
                max_reached: max_reached.len(),
                max_retry_attempts: self.policy.max_attempts,
                retry_reset_days: self.policy.reset_after_days,
            },
            waiting,
            max_reached,
        }
    }
}
