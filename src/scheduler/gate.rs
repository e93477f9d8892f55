use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::{
    clients::RecordStore,
    domain::Domain,
    scheduler::ledger::RetryLedger,
};

pub const DEFAULT_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing sampled is eligible; the cycle does no work.
    Skip,
    /// Domains with at least one eligible sampled record, building first.
    Run(Vec<Domain>),
}

/// Cheap pre-check that keeps idle cycles from running full passes.
///
/// Only a bounded prefix of each record set is inspected, so an eligible
/// record beyond the sample can be missed until the prefix changes.
pub struct SchedulerGate {
    store: Arc<dyn RecordStore>,
    ledger: Arc<RetryLedger>,
    sample_size: usize,
}

impl SchedulerGate {
    pub fn new(store: Arc<dyn RecordStore>, ledger: Arc<RetryLedger>, sample_size: usize) -> Self {
        Self {
            store,
            ledger,
            sample_size: sample_size.max(1),
        }
    }

    /// # Errors
    /// Propagates a sampling failure from either domain; the caller skips the cycle.
    pub async fn evaluate(&self) -> Result<GateDecision> {
        let mut runnable = Vec::new();

        for domain in Domain::ALL {
            let sample = self.store.select_by_view(domain, Some(self.sample_size)).await?;
            let eligible = sample
                .iter()
                .filter(|record| self.ledger.can_retry(&record.id))
                .count();
            debug!(domain = %domain, sampled = sample.len(), eligible, "gate sample evaluated");
            if eligible > 0 {
                runnable.push(domain);
            }
        }

        if runnable.is_empty() {
            Ok(GateDecision::Skip)
        } else {
            Ok(GateDecision::Run(runnable))
        }
    }
}
