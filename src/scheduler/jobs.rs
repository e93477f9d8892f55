use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};
use tracing::{error, info, warn};

use crate::{
    clients::{Notifier, RecordStore},
    domain::{Domain, Record},
    observability::metrics::Metrics,
    pipeline::Processors,
    scheduler::ledger::{Attempt, RetryLedger},
    util::time::{Clock, to_iso_millis},
};

pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Counts for one pass over a domain's record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Records that reached the retry limit during this pass.
    pub newly_failed: Vec<Record>,
    /// Set when the pass could not start, e.g. the store was unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    fn aborted(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AllJobsOutcome {
    pub building: JobOutcome,
    pub land: JobOutcome,
    pub timestamp: String,
}

impl AllJobsOutcome {
    /// The first pass-level error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.building.error.as_deref().or(self.land.error.as_deref())
    }
}

#[derive(Default)]
struct RunLocks {
    building: Mutex<()>,
    land: Mutex<()>,
}

impl RunLocks {
    fn get(&self, domain: Domain) -> &Mutex<()> {
        match domain {
            Domain::Building => &self.building,
            Domain::Land => &self.land,
        }
    }
}

/// Drives full passes over a domain: fetch, filter by retry eligibility,
/// process sequentially with pacing, record every attempt, notify once.
pub struct JobOrchestrator {
    store: Arc<dyn RecordStore>,
    processors: Processors,
    ledger: Arc<RetryLedger>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
    pacing: Duration,
    run_locks: RunLocks,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        processors: Processors,
        ledger: Arc<RetryLedger>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            processors,
            ledger,
            notifier,
            metrics,
            clock,
            pacing: DEFAULT_PACING,
            run_locks: RunLocks::default(),
        }
    }

    /// Gap between consecutive record attempts. Zero disables pacing.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<RetryLedger> {
        &self.ledger
    }

    /// Runs one pass for the domain. Per-record failures never abort the pass.
    pub async fn run_pass(&self, domain: Domain) -> JobOutcome {
        let _guard = self.run_locks.get(domain).lock().await;
        let started = Instant::now();
        info!(domain = %domain, "pass started");

        let records = match self.store.select_by_view(domain, None).await {
            Ok(records) => records,
            Err(err) => {
                let message = format!("{err:#}");
                error!(domain = %domain, error = %message, "failed to fetch candidate records");
                self.metrics
                    .record_pass(domain, started.elapsed().as_secs_f64(), true);
                return JobOutcome::aborted(message);
            }
        };

        let mut outcome = JobOutcome {
            total: records.len(),
            ..JobOutcome::default()
        };
        if records.is_empty() {
            info!(domain = %domain, "no records to process");
            self.metrics
                .record_pass(domain, started.elapsed().as_secs_f64(), false);
            return outcome;
        }

        let (eligible, ineligible): (Vec<Record>, Vec<Record>) = records
            .into_iter()
            .partition(|record| self.ledger.can_retry(&record.id));
        outcome.skipped = ineligible.len();
        self.metrics.record_skipped(domain, ineligible.len());
        info!(
            domain = %domain,
            total = outcome.total,
            eligible = eligible.len(),
            skipped = outcome.skipped,
            "candidate records partitioned"
        );

        let processor = self.processors.get(domain);
        for (index, record) in eligible.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            match processor.process(record).await {
                Ok(fields) => {
                    self.ledger.record_attempt(&record.id, Attempt::Success);
                    outcome.success += 1;
                    self.metrics.record_succeeded(domain);
                    info!(domain = %domain, record_id = %record.id, fields = fields.len(), "record processed");
                }
                Err(err) => {
                    let attempt = err.attempt();
                    let result = self.ledger.record_attempt(&record.id, attempt);
                    outcome.failed += 1;
                    self.metrics.record_failed(domain, result.newly_exhausted);
                    warn!(
                        domain = %domain,
                        record_id = %record.id,
                        kind = err.kind(),
                        error = %err,
                        permanent = attempt == Attempt::Permanent,
                        attempts = result.attempts,
                        "record processing failed"
                    );
                    if result.newly_exhausted {
                        outcome.newly_failed.push(record.clone());
                    }
                }
            }
        }

        if !outcome.newly_failed.is_empty() {
            self.notifier.notify(domain, &outcome.newly_failed).await;
            self.metrics.record_notification(domain);
        }

        self.metrics
            .record_pass(domain, started.elapsed().as_secs_f64(), false);
        info!(
            domain = %domain,
            total = outcome.total,
            success = outcome.success,
            failed = outcome.failed,
            skipped = outcome.skipped,
            newly_failed = outcome.newly_failed.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "pass completed"
        );
        outcome
    }

    /// Building pass, then land pass.
    pub async fn run_all(&self) -> AllJobsOutcome {
        let building = self.run_pass(Domain::Building).await;
        let land = self.run_pass(Domain::Land).await;
        AllJobsOutcome {
            building,
            land,
            timestamp: to_iso_millis(self.clock.now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{BuildingProcessor, LandProcessor},
        scheduler::ledger::RetryPolicy,
        testing::{
            FakeBuildingRegistry, FakeLandRegistry, FakeResolver, FakeStore, RecordingNotifier,
            land_field,
        },
        util::time::ManualClock,
    };
    use chrono::{TimeDelta, TimeZone, Utc};
    use prometheus::Registry;

    struct Harness {
        orchestrator: JobOrchestrator,
        store: Arc<FakeStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
        metrics: Arc<Metrics>,
        resolver: Arc<FakeResolver>,
    }

    fn harness(store: FakeStore, building: FakeBuildingRegistry) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
        ));
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let resolver = Arc::new(FakeResolver::default());
        let metrics = Arc::new(Metrics::new(Arc::new(Registry::new())).expect("metrics"));
        let processors = Processors {
            building: Arc::new(BuildingProcessor::new(
                resolver.clone(),
                Arc::new(building),
                store.clone(),
            )),
            land: Arc::new(LandProcessor::new(
                resolver.clone(),
                Arc::new(FakeLandRegistry::new(vec![land_field(&[
                    ("lndpclAr", "120.0"),
                    ("pblntfPclnd", "5000000"),
                ])])),
                store.clone(),
                clock.clone(),
            )),
        };
        let ledger = Arc::new(RetryLedger::new(RetryPolicy::default(), clock.clone()));
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            processors,
            ledger,
            notifier.clone(),
            metrics.clone(),
            clock.clone(),
        )
        .with_pacing(Duration::ZERO);

        Harness {
            orchestrator,
            store,
            notifier,
            clock,
            metrics,
            resolver,
        }
    }

    #[tokio::test]
    async fn empty_record_set_yields_zero_outcome() {
        let h = harness(FakeStore::default(), FakeBuildingRegistry::with_item());
        let outcome = h.orchestrator.run_pass(Domain::Building).await;
        assert_eq!(outcome, JobOutcome::default());
        assert!(h.notifier.batches().is_empty());
    }

    #[tokio::test]
    async fn store_failure_aborts_pass_with_error() {
        let store = FakeStore::default();
        *store.fail_select.lock().unwrap() = true;
        let h = harness(store, FakeBuildingRegistry::with_item());

        let outcome = h.orchestrator.run_pass(Domain::Land).await;
        assert_eq!(outcome.total, 0);
        assert!(outcome.error.as_deref().is_some_and(|e| e.contains("store unavailable")));
        assert_eq!(
            h.metrics.passes_failed.with_label_values(&["land"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn mixed_pass_counts_and_notifies_permanent_failures_once() {
        let store = FakeStore::with(
            Domain::Building,
            vec![
                Record::new("ok", "강남구 역삼동 123-4"),
                Record::new("bad", "서울시청"),
                Record::new("slow", "없는구 어딘가동 1"),
            ],
        );
        let h = harness(store, FakeBuildingRegistry::with_item());

        let outcome = h.orchestrator.run_pass(Domain::Building).await;
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.success, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.newly_failed, vec![Record::new("bad", "서울시청")]);
        assert_eq!(
            h.notifier.batches(),
            vec![(Domain::Building, vec!["bad".to_string()])]
        );
        assert_eq!(h.store.updated_ids(), vec!["ok".to_string()]);
        assert_eq!(h.orchestrator.ledger().attempts("slow"), 1);

        let second = h.orchestrator.run_pass(Domain::Building).await;
        assert_eq!(second.skipped, 1);
        assert_eq!(second.failed, 1);
        assert!(second.newly_failed.is_empty());
        assert_eq!(h.notifier.batches().len(), 1);
    }

    #[tokio::test]
    async fn five_transient_failures_notify_once_then_skip() {
        let store = FakeStore::with(Domain::Building, vec![Record::new("r1", "없는구 어딘가동 1")]);
        let h = harness(store, FakeBuildingRegistry::with_item());

        for pass in 1..=5 {
            let outcome = h.orchestrator.run_pass(Domain::Building).await;
            assert_eq!(outcome.failed, 1, "pass {pass}");
            assert_eq!(outcome.newly_failed.len(), usize::from(pass == 5), "pass {pass}");
        }
        assert_eq!(h.notifier.batches(), vec![(Domain::Building, vec!["r1".to_string()])]);
        assert_eq!(h.resolver.calls(), 5);

        let sixth = h.orchestrator.run_pass(Domain::Building).await;
        assert_eq!(sixth.skipped, 1);
        assert_eq!(sixth.failed, 0);
        assert_eq!(h.resolver.calls(), 5, "skipped record must not reach upstream");
        assert_eq!(h.orchestrator.ledger().attempts("r1"), 5);
        assert_eq!(h.notifier.batches().len(), 1);

        h.clock.advance(TimeDelta::days(7));
        let after_cooldown = h.orchestrator.run_pass(Domain::Building).await;
        assert_eq!(after_cooldown.skipped, 0);
        assert_eq!(after_cooldown.failed, 1);
        assert_eq!(h.orchestrator.ledger().attempts("r1"), 1);
    }

    #[tokio::test]
    async fn success_after_failures_clears_ledger() {
        let store = FakeStore::with(Domain::Land, vec![Record::new("l1", "없는구 어딘가동 1")]);
        let h = harness(store, FakeBuildingRegistry::with_item());

        h.orchestrator.run_pass(Domain::Land).await;
        assert_eq!(h.orchestrator.ledger().attempts("l1"), 1);

        h.store
            .set(Domain::Land, vec![Record::new("l1", "강남구 역삼동 123-4")]);
        let outcome = h.orchestrator.run_pass(Domain::Land).await;
        assert_eq!(outcome.success, 1);
        assert!(h.orchestrator.ledger().entry("l1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_paced() {
        let store = FakeStore::with(
            Domain::Building,
            vec![
                Record::new("a", "강남구 역삼동 1"),
                Record::new("b", "강남구 역삼동 2"),
                Record::new("c", "강남구 역삼동 3"),
            ],
        );
        let h = harness(store, FakeBuildingRegistry::with_item());
        let orchestrator = h.orchestrator.with_pacing(Duration::from_secs(1));

        let started = Instant::now();
        let outcome = orchestrator.run_pass(Domain::Building).await;
        assert_eq!(outcome.success, 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn run_all_covers_both_domains() {
        let store = FakeStore::with(Domain::Building, vec![Record::new("b1", "강남구 역삼동 1")]);
        store.set(Domain::Land, vec![Record::new("l1", "강남구 역삼동 2")]);
        let h = harness(store, FakeBuildingRegistry::with_item());

        let outcome = h.orchestrator.run_all().await;
        assert_eq!(outcome.building.success, 1);
        assert_eq!(outcome.land.success, 1);
        assert!(outcome.error().is_none());
        assert_eq!(outcome.timestamp, "2025-05-01T00:00:00.000Z");
    }
}
