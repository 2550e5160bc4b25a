//! Retention sweep batching for stale intermediate files

use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::classifier::classify;
use crate::error::{AppError, Result};
use crate::models::ArchiverPayload;
use crate::storage::BlobListing;

/// Days an intermediate file is kept before it becomes an archival candidate
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Candidates taken per sweep unless configured otherwise.
///
/// The sweep has always stopped at the first eligible file; raising this is a
/// behaviour change for the downstream archiver.
pub const DEFAULT_MAX_CANDIDATES: Option<usize> = Some(1);

/// Cutoff date (`YYYY-MM-DD`) for a sweep triggered at `trigger`.
///
/// A window that falls outside chrono's date range is an `InvalidPayload`.
pub fn cutoff_for(trigger: NaiveDateTime, retention_days: i64) -> Result<String> {
    let cutoff = Duration::try_days(retention_days)
        .and_then(|window| trigger.checked_sub_signed(window))
        .ok_or_else(|| {
            AppError::InvalidPayload(format!(
                "Retention window of {} days is out of range for {}",
                retention_days, trigger
            ))
        })?;
    Ok(cutoff.format("%Y-%m-%d").to_string())
}

/// Archival candidates grouped by the date in their path.
///
/// Buckets keep first-appearance order, entries keep encounter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionBatch {
    index: HashMap<String, usize>,
    buckets: Vec<(String, Vec<ArchiverPayload>)>,
}

impl RetentionBatch {
    pub fn push(&mut self, payload: ArchiverPayload) {
        match self.index.get(&payload.date) {
            Some(&slot) => self.buckets[slot].1.push(payload),
            None => {
                self.index.insert(payload.date.clone(), self.buckets.len());
                self.buckets.push((payload.date.clone(), vec![payload]));
            }
        }
    }

    pub fn get(&self, date: &str) -> Option<&[ArchiverPayload]> {
        self.index
            .get(date)
            .map(|&slot| self.buckets[slot].1.as_slice())
    }

    /// Date keys in first-appearance order
    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(date, _)| date.as_str())
    }

    /// Total number of candidates across all buckets
    pub fn candidate_count(&self) -> usize {
        self.buckets.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn into_batches(self) -> Vec<Vec<ArchiverPayload>> {
        self.buckets.into_iter().map(|(_, items)| items).collect()
    }
}

/// Selects expired intermediate files from a blob listing.
#[derive(Debug, Clone)]
pub struct RetentionBatcher {
    cutoff: String,
    max_candidates: Option<usize>,
}

impl RetentionBatcher {
    /// `cutoff` is an inclusive `YYYY-MM-DD` bound.
    pub fn new(cutoff: impl Into<String>) -> Self {
        Self {
            cutoff: cutoff.into(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Stop scanning after this many candidates; `None` scans everything.
    pub fn with_max_candidates(mut self, max_candidates: Option<usize>) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn cutoff(&self) -> &str {
        &self.cutoff
    }

    pub fn batch<'a, I>(&self, blobs: I) -> RetentionBatch
    where
        I: IntoIterator<Item = &'a BlobListing>,
    {
        let mut batch = RetentionBatch::default();
        let mut taken = 0usize;

        if self.max_candidates == Some(0) {
            return batch;
        }

        for blob in blobs {
            let Some(path) = classify(&blob.name) else {
                info!(path = %blob.name, "Unmatched pattern");
                continue;
            };

            // Both sides are zero-padded ISO dates
            if path.date.as_str() > self.cutoff.as_str() {
                debug!(path = %blob.name, date = %path.date, "Too recent to archive");
                continue;
            }

            batch.push(ArchiverPayload::new(path, blob.content_type.as_deref()));
            taken += 1;

            if self.max_candidates.is_some_and(|max| taken >= max) {
                break;
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_CONTENT_TYPE;
    use chrono::NaiveDate;

    fn blob(name: &str) -> BlobListing {
        BlobListing {
            name: name.to_string(),
            content_type: None,
        }
    }

    fn trigger(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    #[test]
    fn test_cutoff_is_seven_days_before_trigger() {
        assert_eq!(cutoff_for(trigger(2022, 8, 10), DEFAULT_RETENTION_DAYS).unwrap(), "2022-08-03");
        assert_eq!(cutoff_for(trigger(2022, 3, 2), DEFAULT_RETENTION_DAYS).unwrap(), "2022-02-23");
        assert_eq!(cutoff_for(trigger(2023, 1, 5), DEFAULT_RETENTION_DAYS).unwrap(), "2022-12-29");
    }

    #[test]
    fn test_cutoff_out_of_range_is_an_error() {
        let err = cutoff_for(trigger(2022, 8, 10), 100_000_000).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));

        let err = cutoff_for(trigger(2022, 8, 10), i64::MAX).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }

    #[test]
    fn test_too_recent_paths_are_excluded() {
        let cutoff = cutoff_for(trigger(2022, 8, 10), DEFAULT_RETENTION_DAYS).unwrap();
        let blobs = vec![blob("etl/metric/2022-08-05/a.ft"), blob("etl/metric/2022-08-01/b.ft")];

        let batch = RetentionBatcher::new(cutoff)
            .with_max_candidates(None)
            .batch(&blobs);

        assert!(batch.get("2022-08-05").is_none());
        assert_eq!(batch.get("2022-08-01").unwrap()[0].filename, "b.ft");
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let blobs = vec![blob("etl/metric/2022-08-03/a.ft")];
        let batch = RetentionBatcher::new("2022-08-03").batch(&blobs);
        assert_eq!(batch.candidate_count(), 1);
    }

    #[test]
    fn test_stops_after_first_candidate_by_default() {
        // Regression: only one candidate is ever produced per sweep
        let blobs = vec![
            blob("etl/metric/2022-08-09/recent.ft"),
            blob("not-an-etl-file.txt"),
            blob("etl/metric/2022-07-01/first.ft"),
            blob("etl/metric/2022-07-01/second.ft"),
            blob("etl/other/2022-06-01/third.ft"),
        ];

        let batches = RetentionBatcher::new("2022-08-03").batch(&blobs).into_batches();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].filename, "first.ft");
    }

    #[test]
    fn test_unlimited_groups_by_date_in_encounter_order() {
        let blobs = vec![
            blob("etl/metric/2022-07-02/a.ft"),
            blob("etl/metric/sub/2022-07-01/b.ft"),
            blob("etl/metric/2022-07-02/c.ft"),
            blob("etl/metric/2022-08-09/too-new.ft"),
            blob("etl/metric/2022-07-01/d.ft"),
        ];

        let batch = RetentionBatcher::new("2022-08-03")
            .with_max_candidates(None)
            .batch(&blobs);

        assert_eq!(batch.dates().collect::<Vec<_>>(), vec!["2022-07-02", "2022-07-01"]);
        let batches = batch.into_batches();
        let names: Vec<Vec<&str>> = batches
            .iter()
            .map(|items| items.iter().map(|p| p.filename.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["a.ft", "c.ft"], vec!["b.ft", "d.ft"]]);
    }

    #[test]
    fn test_limit_counts_candidates_not_blobs() {
        let blobs = vec![
            blob("etl/metric/2022-09-01/new.ft"),
            blob("etl/metric/2022-07-01/a.ft"),
            blob("etl/metric/2022-07-02/b.ft"),
            blob("etl/metric/2022-07-03/c.ft"),
        ];

        let batch = RetentionBatcher::new("2022-08-03")
            .with_max_candidates(Some(2))
            .batch(&blobs);
        assert_eq!(batch.candidate_count(), 2);
        assert_eq!(batch.dates().collect::<Vec<_>>(), vec!["2022-07-01", "2022-07-02"]);
    }

    #[test]
    fn test_content_type_from_listing_or_default() {
        let blobs = vec![
            BlobListing {
                name: "etl/metric/2022-07-01/a.ft".to_string(),
                content_type: Some("application/vnd.apache.arrow.file".to_string()),
            },
            blob("etl/metric/2022-07-01/b.ft"),
        ];

        let batch = RetentionBatcher::new("2022-08-03")
            .with_max_candidates(None)
            .batch(&blobs);
        let items = batch.get("2022-07-01").unwrap();
        assert_eq!(items[0].content_type, "application/vnd.apache.arrow.file");
        assert_eq!(items[1].content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_empty_and_unmatched_input() {
        let blobs = vec![blob("etl/bad/file.ft"), blob("etl/metric/2022-13-40/x.ft")];
        let batch = RetentionBatcher::new("2022-08-03").batch(&blobs);
        assert!(batch.is_empty());
        assert!(RetentionBatcher::new("2022-08-03")
            .batch(&Vec::<BlobListing>::new())
            .is_empty());
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let blobs = vec![
            blob("etl/metric/2022-07-02/a.ft"),
            blob("etl/metric/2022-07-01/b.ft"),
        ];
        let batcher = RetentionBatcher::new("2022-08-03").with_max_candidates(None);
        assert_eq!(batcher.batch(&blobs), batcher.batch(&blobs));
    }
}
