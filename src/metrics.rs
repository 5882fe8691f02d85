//! Pipeline metrics recorded through the `metrics` facade.
//!
//! The `serve` command installs a Prometheus recorder and exposes the values at
//! `/metrics`; without a recorder the calls are no-ops.

use crate::pipeline::clean::CleaningReport;
use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub const RUNS_TOTAL: &str = "campaign_pipeline_runs_total";
pub const RUN_FAILURES_TOTAL: &str = "campaign_pipeline_run_failures_total";
pub const ROWS_INGESTED_TOTAL: &str = "campaign_pipeline_rows_ingested_total";
pub const ROWS_PUBLISHED_TOTAL: &str = "campaign_pipeline_rows_published_total";
pub const ROWS_REJECTED_TOTAL: &str = "campaign_pipeline_rows_rejected_total";
pub const RUN_DURATION_SECONDS: &str = "campaign_pipeline_run_duration_seconds";

/// Install the global Prometheus recorder and return the handle used to render it.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Pre-register metrics so they appear on `/metrics` before the first run.
pub fn register_metrics() {
    let _ = counter!(RUNS_TOTAL);
    let _ = counter!(ROWS_INGESTED_TOTAL);
    let _ = counter!(ROWS_PUBLISHED_TOTAL);
    let _ = histogram!(RUN_DURATION_SECONDS);
}

pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_run_started() {
        counter!(RUNS_TOTAL).increment(1);
    }

    pub fn record_ingested(rows: usize) {
        counter!(ROWS_INGESTED_TOTAL).increment(rows as u64);
    }

    pub fn record_cleaning(report: &CleaningReport) {
        for (reason, count) in report.rejections() {
            if count > 0 {
                counter!(ROWS_REJECTED_TOTAL, "reason" => reason).increment(count as u64);
            }
        }
    }

    pub fn record_published(rows: u64) {
        counter!(ROWS_PUBLISHED_TOTAL).increment(rows);
    }

    pub fn record_failure(stage: &'static str) {
        counter!(RUN_FAILURES_TOTAL, "stage" => stage).increment(1);
    }
}

/// Records the elapsed run time into the duration histogram when dropped.
pub struct TimingGuard {
    start: Instant,
    histogram_name: &'static str,
}

impl TimingGuard {
    pub fn new(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        histogram!(self.histogram_name).record(self.elapsed_secs());
    }
}
