//! Prometheus metrics endpoint

use axum::response::IntoResponse;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters for Prometheus
#[derive(Default)]
pub struct Metrics {
    /// Charts uploaded to the downloads container
    charts_uploaded_total: AtomicU64,
    /// Charts skipped (unknown metric, no change record)
    charts_skipped_total: AtomicU64,
    /// Intermediate files handed to the archiver
    archive_candidates_total: AtomicU64,
    /// Pipeline runs started
    runs_total: AtomicU64,
    /// Pipeline runs aborted by an upstream failure
    runs_failed_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_charts_uploaded(&self, count: u64) {
        self.charts_uploaded_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_charts_skipped(&self, count: u64) {
        self.charts_skipped_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_archive_candidates(&self, count: u64) {
        self.archive_candidates_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_runs(&self) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            charts_uploaded_total: self.charts_uploaded_total.load(Ordering::Relaxed),
            charts_skipped_total: self.charts_skipped_total.load(Ordering::Relaxed),
            archive_candidates_total: self.archive_candidates_total.load(Ordering::Relaxed),
            runs_total: self.runs_total.load(Ordering::Relaxed),
            runs_failed_total: self.runs_failed_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub charts_uploaded_total: u64,
    pub charts_skipped_total: u64,
    pub archive_candidates_total: u64,
    pub runs_total: u64,
    pub runs_failed_total: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition
    pub fn render(&self) -> String {
        format!(
            r#"# HELP homepage_etl_charts_uploaded_total Total number of charts uploaded
# TYPE homepage_etl_charts_uploaded_total counter
homepage_etl_charts_uploaded_total {}

# HELP homepage_etl_charts_skipped_total Total number of charts skipped
# TYPE homepage_etl_charts_skipped_total counter
homepage_etl_charts_skipped_total {}

# HELP homepage_etl_archive_candidates_total Total number of intermediate files found for archival
# TYPE homepage_etl_archive_candidates_total counter
homepage_etl_archive_candidates_total {}

# HELP homepage_etl_runs_total Total number of pipeline runs started
# TYPE homepage_etl_runs_total counter
homepage_etl_runs_total {}

# HELP homepage_etl_runs_failed_total Total number of pipeline runs that failed
# TYPE homepage_etl_runs_failed_total counter
homepage_etl_runs_failed_total {}

# HELP homepage_etl_info Build information
# TYPE homepage_etl_info gauge
homepage_etl_info{{version="{}"}} 1
"#,
            self.charts_uploaded_total,
            self.charts_skipped_total,
            self.archive_candidates_total,
            self.runs_total,
            self.runs_failed_total,
            env!("CARGO_PKG_VERSION"),
        )
    }
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> impl IntoResponse {
    let output = state.metrics.get_metrics().render();

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
