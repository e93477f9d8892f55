//! Prometheus metrics, labelled by domain where it applies.
use std::sync::Arc;

use prometheus::{
    HistogramVec, IntCounter, IntCounterVec, Registry, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
};

use crate::domain::Domain;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub records_succeeded: IntCounterVec,
    pub records_failed: IntCounterVec,
    pub records_skipped: IntCounterVec,
    pub records_exhausted: IntCounterVec,
    pub passes_completed: IntCounterVec,
    pub passes_failed: IntCounterVec,
    pub notifications_sent: IntCounterVec,
    pub gate_skips: IntCounter,
    pub pass_duration: HistogramVec,
}

impl Metrics {
    /// # Errors
    /// Fails when a metric with the same name is already registered.
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            records_succeeded: register_int_counter_vec_with_registry!(
                "parcel_sync_records_succeeded_total",
                "Records processed and written back",
                &["domain"],
                registry
            )?,
            records_failed: register_int_counter_vec_with_registry!(
                "parcel_sync_records_failed_total",
                "Record attempts that failed",
                &["domain"],
                registry
            )?,
            records_skipped: register_int_counter_vec_with_registry!(
                "parcel_sync_records_skipped_total",
                "Records skipped because they were not eligible for retry",
                &["domain"],
                registry
            )?,
            records_exhausted: register_int_counter_vec_with_registry!(
                "parcel_sync_records_exhausted_total",
                "Records that reached the retry limit",
                &["domain"],
                registry
            )?,
            passes_completed: register_int_counter_vec_with_registry!(
                "parcel_sync_passes_completed_total",
                "Completed orchestration passes",
                &["domain"],
                registry
            )?,
            passes_failed: register_int_counter_vec_with_registry!(
                "parcel_sync_passes_failed_total",
                "Passes aborted before processing any record",
                &["domain"],
                registry
            )?,
            notifications_sent: register_int_counter_vec_with_registry!(
                "parcel_sync_notifications_total",
                "Failure notifications handed to the notifier",
                &["domain"],
                registry
            )?,
            gate_skips: register_int_counter_with_registry!(
                "parcel_sync_gate_skips_total",
                "Scheduled cycles skipped because nothing was eligible",
                registry
            )?,
            pass_duration: register_histogram_vec_with_registry!(
                "parcel_sync_pass_duration_seconds",
                "Duration of orchestration passes",
                &["domain"],
                registry
            )?,
        })
    }

    pub fn record_succeeded(&self, domain: Domain) {
        self.records_succeeded.with_label_values(&[domain.as_str()]).inc();
    }

    pub fn record_failed(&self, domain: Domain, exhausted: bool) {
        self.records_failed.with_label_values(&[domain.as_str()]).inc();
        if exhausted {
            self.records_exhausted.with_label_values(&[domain.as_str()]).inc();
        }
    }

    pub fn record_skipped(&self, domain: Domain, count: usize) {
        self.records_skipped
            .with_label_values(&[domain.as_str()])
            .inc_by(count as u64);
    }

    pub fn record_pass(&self, domain: Domain, seconds: f64, failed: bool) {
        let label = [domain.as_str()];
        if failed {
            self.passes_failed.with_label_values(&label).inc();
        } else {
            self.passes_completed.with_label_values(&label).inc();
        }
        self.pass_duration.with_label_values(&label).observe(seconds);
    }

    pub fn record_notification(&self, domain: Domain) {
        self.notifications_sent.with_label_values(&[domain.as_str()]).inc();
    }

    pub fn record_gate_skip(&self) {
        self.gate_skips.inc();
    }
}
