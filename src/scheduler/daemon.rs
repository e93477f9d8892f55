use std::sync::Arc;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};

use crate::{
    domain::Domain,
    observability::metrics::Metrics,
    scheduler::{
        cadence::{IntervalCadence, duration_until},
        gate::{GateDecision, SchedulerGate},
        jobs::JobOrchestrator,
    },
    util::time::Clock,
};

/// Recurring trigger: wait for the next boundary, consult the gate, run the
/// passes it allows. Passes are awaited inline so cycles never overlap.
pub struct SyncDaemon {
    orchestrator: Arc<JobOrchestrator>,
    gate: SchedulerGate,
    cadence: IntervalCadence,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
}

impl SyncDaemon {
    pub fn new(
        orchestrator: Arc<JobOrchestrator>,
        gate: SchedulerGate,
        cadence: IntervalCadence,
        metrics: Arc<Metrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orchestrator,
            gate,
            cadence,
            metrics,
            clock,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        loop {
            let now = self.clock.now();
            let next = self.cadence.next_run_from(now);
            let wait = duration_until(next, now);
            info!(
                next_run_utc = %next.to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "scheduled next sync cycle"
            );
            sleep(wait).await;

            self.run_cycle().await;
        }
    }

    /// One gated cycle. Returns the domains whose passes ran.
    pub async fn run_cycle(&self) -> Vec<Domain> {
        let domains = match self.gate.evaluate().await {
            Ok(GateDecision::Run(domains)) => domains,
            Ok(GateDecision::Skip) => {
                info!("no eligible records sampled; skipping cycle");
                self.metrics.record_gate_skip();
                return Vec::new();
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "gate sampling failed; skipping cycle");
                return Vec::new();
            }
        };

        for domain in &domains {
            let outcome = self.orchestrator.run_pass(*domain).await;
            if let Some(message) = &outcome.error {
                error!(domain = %domain, error = %message, "scheduled pass failed");
            }
        }
        domains
    }
}
