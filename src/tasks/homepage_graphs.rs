//! Homepage graphs pipeline - headline thumbnails and vaccination waffles

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chart::{self, Metric, ThumbnailSeries, WaffleInput};
use crate::error::{AppError, Result};
use crate::models::{
    AgeBandRecord, Category, ChangeRecord, GraphsPayload, TimeseriesPoint, VaccinationRecord,
};
use crate::reducer::{latest_per_group, GroupKey};
use crate::render::ChartRenderer;
use crate::routes::metrics::Metrics;
use crate::storage::{BlobStore, UploadOptions};

/// Headline metrics a thumbnail is attempted for, in upload order
pub const HEADLINE_METRICS: [&str; 6] = [
    "newAdmissions",
    "newCasesByPublishDate",
    "newDeaths28DaysByPublishDate",
    "newCasesBySpecimenDate",
    "newDeaths28DaysByDeathDate",
    "newVirusTestsByPublishDate",
];

const VACCINATIONS: &str = "vaccinations";

/// Rows the homepage charts are built from
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Overview series for `metric`, newest first
    async fn timeseries(&self, date: NaiveDate, metric: &str) -> Result<Vec<TimeseriesPoint>>;

    /// Latest `<metric>Change` value
    async fn latest_change(&self, date: NaiveDate, metric: &str) -> Result<Option<ChangeRecord>>;

    async fn vaccinations(&self, date: NaiveDate) -> Result<Vec<VaccinationRecord>>;

    async fn vaccinations_50_plus(&self, date: NaiveDate) -> Result<Vec<AgeBandRecord>>;
}

/// Collaborators for one pipeline run
#[derive(Clone)]
pub struct GraphsContext {
    pub source: Arc<dyn GraphSource>,
    pub store: Arc<dyn BlobStore>,
    pub renderer: Arc<dyn ChartRenderer>,
    pub metrics: Arc<Metrics>,
}

/// Outcome of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

pub fn thumbnail_path(date: NaiveDate, metric: &str) -> String {
    format!("homepage/{}/thumbnail_{}.svg", date, metric)
}

pub fn area_thumbnail_path(date: NaiveDate, metric: &str, key: &GroupKey) -> String {
    format!(
        "homepage/{}/{}/{}/{}_thumbnail.svg",
        date, metric, key.area_type, key.area_code
    )
}

pub fn area_50_plus_path(date: NaiveDate, metric: &str, key: &GroupKey) -> String {
    format!(
        "homepage/{}/{}/{}/{}_50_plus_thumbnail.svg",
        date, metric, key.area_type, key.area_code
    )
}

/// Build and upload the charts selected by `payload`.
///
/// Chart-scoped failures (unknown metric, missing change) skip that chart.
/// Query and storage failures abort the run.
pub async fn run(ctx: &GraphsContext, payload: &GraphsPayload) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    match payload.category {
        Category::Main => {
            for metric in HEADLINE_METRICS {
                match upload_thumbnail(ctx, payload.date, metric).await {
                    Ok(path) => summary.uploaded.push(path),
                    Err(e) if e.is_chart_scoped() => {
                        warn!(error = %e, metric = %metric, "Skipping thumbnail");
                        ctx.metrics.inc_charts_skipped(1);
                        summary.skipped.push(metric.to_string());
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Category::Vaccination => {
            summary.uploaded.extend(upload_vaccinations(ctx, payload.date).await?);
            summary
                .uploaded
                .extend(upload_vaccinations_50_plus(ctx, payload.date).await?);
        }
    }

    info!(
        date = %payload.date,
        category = ?payload.category,
        uploaded = summary.uploaded.len(),
        skipped = summary.skipped.len(),
        "Homepage graphs done"
    );
    Ok(summary)
}

async fn upload_thumbnail(ctx: &GraphsContext, date: NaiveDate, metric: &str) -> Result<String> {
    // Unknown metrics fail before any query is issued
    let parsed: Metric = metric.parse()?;

    let points = ctx.source.timeseries(date, metric).await?;
    let change = ctx
        .source
        .latest_change(date, metric)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No change record for {}", metric)))?;

    let trend = parsed.trend(&change);
    let svg = ctx
        .renderer
        .thumbnail(&ThumbnailSeries::from_points(&points), trend)?;

    let path = thumbnail_path(date, metric);
    upload_svg(ctx, &path, svg).await?;
    debug!(metric = %metric, trend = ?trend, path = %path, "Uploaded thumbnail");
    Ok(path)
}

async fn upload_vaccinations(ctx: &GraphsContext, date: NaiveDate) -> Result<Vec<String>> {
    let rows = ctx.source.vaccinations(date).await?;
    let latest = latest_per_group(rows);

    let mut uploaded = Vec::with_capacity(latest.len());
    for (key, record) in latest {
        let svg = ctx.renderer.waffle(&WaffleInput::from(&record))?;
        let path = area_thumbnail_path(date, VACCINATIONS, &key);
        upload_svg(ctx, &path, svg).await?;
        uploaded.push(path);
    }

    debug!(count = uploaded.len(), "Uploaded vaccination waffles");
    Ok(uploaded)
}

/// One waffle per area, drawn from the most recent row for that area
async fn upload_vaccinations_50_plus(ctx: &GraphsContext, date: NaiveDate) -> Result<Vec<String>> {
    let rows = ctx.source.vaccinations_50_plus(date).await?;
    let row_count = rows.len();
    let latest = latest_per_group(rows);

    let mut uploaded = Vec::with_capacity(latest.len());
    for (key, record) in latest {
        let svg = ctx.renderer.waffle(&chart::extract_50_plus(&record))?;
        let path = area_50_plus_path(date, VACCINATIONS, &key);
        upload_svg(ctx, &path, svg).await?;
        uploaded.push(path);
    }

    debug!(rows = row_count, count = uploaded.len(), "Uploaded 50+ waffles");
    Ok(uploaded)
}

async fn upload_svg(ctx: &GraphsContext, path: &str, svg: String) -> Result<()> {
    ctx.store
        .upload(path, Bytes::from(svg), &UploadOptions::homepage_svg())
        .await?;
    ctx.metrics.inc_charts_uploaded(1);
    Ok(())
}

/// Background task that rebuilds the homepage charts for the current date.
///
/// Each tick runs the headline thumbnails, then the vaccination waffles.
pub async fn homepage_graphs_task(ctx: GraphsContext, every: Duration) {
    let mut interval = tokio::time::interval(every);

    info!("Homepage graphs task started ({}s interval)", every.as_secs());

    loop {
        interval.tick().await;

        let date = Utc::now().date_naive();
        for category in [Category::Main, Category::Vaccination] {
            let payload = GraphsPayload { date, category };
            let span = info_span!("homepage_graphs", run_id = %Uuid::new_v4(), date = %date);

            ctx.metrics.inc_runs();
            if let Err(e) = run(&ctx, &payload).instrument(span).await {
                ctx.metrics.inc_runs_failed();
                error!(error = %e, category = ?category, "Homepage graphs run failed");
            }
        }
    }
}
