//! Housekeeping retriever - finds stale intermediate files for the archiver

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::classifier::INTERMEDIATE_PREFIX;
use crate::error::Result;
use crate::models::{ArchiverPayload, RetrieverPayload};
use crate::retention::{cutoff_for, RetentionBatcher, DEFAULT_MAX_CANDIDATES, DEFAULT_RETENTION_DAYS};
use crate::routes::metrics::Metrics;
use crate::storage::BlobStore;

/// Retention sweep settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HousekeepingConfig {
    pub retention_days: i64,
    /// `None` takes every eligible file
    pub max_candidates: Option<usize>,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// List the pipeline container and return archival candidates, one inner
/// list per date.
pub async fn retrieve(
    store: &dyn BlobStore,
    payload: &RetrieverPayload,
    config: &HousekeepingConfig,
) -> Result<Vec<Vec<ArchiverPayload>>> {
    info!(timestamp = %payload.timestamp, "Triggered housekeeping retriever");

    let trigger = payload.trigger_time()?;
    let batcher = RetentionBatcher::new(cutoff_for(trigger, config.retention_days)?)
        .with_max_candidates(config.max_candidates);

    let blobs = store.list(INTERMEDIATE_PREFIX).await?;
    debug!(blobs = blobs.len(), cutoff = %batcher.cutoff(), "Scanning intermediate files");

    let batch = batcher.batch(&blobs);

    info!(
        timestamp = %payload.timestamp,
        dates = batch.dates().count(),
        candidates = batch.candidate_count(),
        "Done processing"
    );
    Ok(batch.into_batches())
}

/// Background task that sweeps the pipeline container.
///
/// Candidates are logged for the archiver; nothing is moved or deleted here.
pub async fn housekeeping_task(
    store: Arc<dyn BlobStore>,
    config: HousekeepingConfig,
    metrics: Arc<Metrics>,
    every: Duration,
) {
    // Let the graphs task take the first slot
    tokio::time::sleep(Duration::from_secs(60)).await;

    let mut interval = tokio::time::interval(every);

    info!("Housekeeping task started ({}s interval)", every.as_secs());

    loop {
        interval.tick().await;

        let payload = RetrieverPayload {
            timestamp: Utc::now().to_rfc3339(),
        };
        let span = info_span!("housekeeping", run_id = %Uuid::new_v4());

        metrics.inc_runs();
        match retrieve(store.as_ref(), &payload, &config).instrument(span).await {
            Ok(batches) => {
                for candidate in batches.iter().flatten() {
                    info!(
                        path = %candidate.from_path,
                        date = %candidate.date,
                        content_type = %candidate.content_type,
                        "Archive candidate"
                    );
                }
                let total: usize = batches.iter().map(Vec::len).sum();
                metrics.inc_archive_candidates(total as u64);
            }
            Err(e) => {
                metrics.inc_runs_failed();
                error!(error = %e, "Housekeeping run failed");
            }
        }
    }
}
