//! Archive write metrics
//!
//! Counters and histograms emitted through the `metrics` facade. Nothing is
//! recorded anywhere until [`init_metrics`] installs the Prometheus recorder;
//! before that every macro call is a no-op.
//!
//! ## Metrics
//!
//! - `archive_writes_total{mode, outcome}` - archive entries written
//! - `archive_lines_written_total{mode}` - lines in written entries
//! - `archive_merge_fallbacks_total` - merges degraded to a full replace
//! - `archive_write_duration_seconds{mode}` - read-modify-write duration
//! - `bulk_dates_written_total{path}` - fine-path dates written by the bulk pipeline
//! - `bulk_requests_total{status}` - bulk pipeline invocations

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Instant;
use tracing::{debug, info};

/// Installed Prometheus recorder
static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and register metric descriptions
///
/// Idempotent: later calls return without reinstalling.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if PROMETHEUS.get().is_some() {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))?;

    describe_counter!(
        "archive_writes_total",
        Unit::Count,
        "Total number of archive entries written"
    );

    describe_counter!(
        "archive_lines_written_total",
        Unit::Count,
        "Total number of lines in written archive entries"
    );

    describe_counter!(
        "archive_merge_fallbacks_total",
        Unit::Count,
        "Merges that found unparsable existing lines and replaced the entry"
    );

    describe_histogram!(
        "archive_write_duration_seconds",
        Unit::Seconds,
        "Duration of a single archive read-modify-write"
    );

    describe_counter!(
        "bulk_dates_written_total",
        Unit::Count,
        "Dates written by the bulk history pipeline"
    );

    describe_counter!(
        "bulk_requests_total",
        Unit::Count,
        "Bulk history pipeline invocations"
    );

    // A concurrent caller may have won the race; its handle renders the same registry
    let _ = PROMETHEUS.set(handle);
    info!("Metrics recorder installed");
    Ok(())
}

/// Render all metrics in Prometheus text format
///
/// Returns `None` when [`init_metrics`] has not been called.
pub fn render() -> Option<String> {
    PROMETHEUS.get().map(PrometheusHandle::render)
}

/// Timing and counters for one archive entry write
pub struct ArchiveWriteMetrics {
    mode: &'static str,
    start_time: Instant,
}

impl ArchiveWriteMetrics {
    /// Start timing a write in `mode` (`merge` or `replace`)
    pub fn start(mode: &'static str) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    /// Record a committed write
    pub fn record_success(&self, outcome: &'static str, lines: usize) {
        let duration = self.start_time.elapsed();

        counter!(
            "archive_writes_total",
            "mode" => self.mode,
            "outcome" => outcome,
        )
        .increment(1);

        counter!("archive_lines_written_total", "mode" => self.mode).increment(lines as u64);

        histogram!("archive_write_duration_seconds", "mode" => self.mode)
            .record(duration.as_secs_f64());
    }
}

/// Record a merge that degraded to a full replace
pub fn record_merge_fallback() {
    counter!("archive_merge_fallbacks_total").increment(1);
}

/// Record one date written by the bulk pipeline's fine path
pub fn record_bulk_date() {
    counter!("bulk_dates_written_total", "path" => "fine").increment(1);
}

/// Record the end of a bulk pipeline invocation
pub fn record_bulk_request(succeeded: bool) {
    let status = if succeeded { "success" } else { "failure" };
    counter!("bulk_requests_total", "status" => status).increment(1);
}
