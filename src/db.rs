//! Database access layer with SQLx and PostgreSQL
//!
//! Every fetch runs inside its own transaction. The transaction is committed
//! when the query succeeds and rolled back before the error is returned.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{AgeBandEntry, AgeBandRecord, ChangeRecord, TimeseriesPoint, VaccinationRecord};
use crate::queries;
use crate::tasks::homepage_graphs::GraphSource;

/// Database connection pool and operations
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {}", e)))?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Headline series for `metric` from the release partition, newest first
    pub async fn get_timeseries(&self, date: NaiveDate, metric: &str) -> Result<Vec<TimeseriesPoint>> {
        let sql = queries::render(queries::TIMESERIES_QUERY, &queries::other_partition(date));

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&sql)
            .bind(queries::other_partition_id(date))
            .bind(metric)
            .fetch_all(&mut *tx)
            .await;
        let rows = finish(tx, rows).await?;

        debug!(metric = %metric, rows = rows.len(), "Fetched time series");
        rows.iter().map(timeseries_point).collect()
    }

    /// Latest value of `<metric>Change`, if any within the last 30 days
    pub async fn get_latest_change(&self, date: NaiveDate, metric: &str) -> Result<Option<ChangeRecord>> {
        let sql = queries::render(queries::LATEST_CHANGE_QUERY, &queries::other_partition(date));

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&sql)
            .bind(queries::other_partition_id(date))
            .bind(date)
            .bind(format!("{}Change", metric))
            .fetch_optional(&mut *tx)
            .await;
        let row = finish(tx, row).await?;

        row.as_ref().map(change_record).transpose()
    }

    /// Latest all-ages dose uptake per area
    pub async fn get_vaccinations(&self, date: NaiveDate) -> Result<Vec<VaccinationRecord>> {
        let sql = queries::render(queries::VACCINATIONS_QUERY, &queries::partition_date(date));

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&sql).bind(date).fetch_all(&mut *tx).await;
        let rows = finish(tx, rows).await?;

        debug!(rows = rows.len(), "Fetched vaccinations");
        rows.iter().map(vaccination_record).collect()
    }

    /// Age-banded booster payloads, unreduced
    pub async fn get_vaccinations_50_plus(&self, date: NaiveDate) -> Result<Vec<AgeBandRecord>> {
        let sql = queries::render(queries::VACCINATIONS_QUERY_50_PLUS, &queries::partition_date(date));

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&sql).fetch_all(&mut *tx).await;
        let rows = finish(tx, rows).await?;

        debug!(rows = rows.len(), "Fetched 50+ vaccinations");
        rows.iter().map(age_band_record).collect()
    }
}

#[async_trait]
impl GraphSource for Database {
    async fn timeseries(&self, date: NaiveDate, metric: &str) -> Result<Vec<TimeseriesPoint>> {
        self.get_timeseries(date, metric).await
    }

    async fn latest_change(&self, date: NaiveDate, metric: &str) -> Result<Option<ChangeRecord>> {
        self.get_latest_change(date, metric).await
    }

    async fn vaccinations(&self, date: NaiveDate) -> Result<Vec<VaccinationRecord>> {
        self.get_vaccinations(date).await
    }

    async fn vaccinations_50_plus(&self, date: NaiveDate) -> Result<Vec<AgeBandRecord>> {
        self.get_vaccinations_50_plus(date).await
    }
}

/// Commit on success, roll back on failure. The query error wins over a
/// rollback error.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    result: std::result::Result<T, sqlx::Error>,
) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Failed to roll back session");
            }
            Err(e.into())
        }
    }
}

fn timeseries_point(row: &PgRow) -> Result<TimeseriesPoint> {
    Ok(TimeseriesPoint {
        date: row.try_get("date")?,
        value: row.try_get("value")?,
    })
}

fn change_record(row: &PgRow) -> Result<ChangeRecord> {
    let value: Option<f64> = row.try_get("value")?;
    Ok(ChangeRecord {
        metric: row.try_get("metric")?,
        date: row.try_get("date")?,
        value: value.ok_or_else(|| AppError::NotFound("Change value is null".into()))?,
    })
}

fn vaccination_record(row: &PgRow) -> Result<VaccinationRecord> {
    Ok(VaccinationRecord {
        area_type: row.try_get("area_type")?,
        area_code: row.try_get("area_code")?,
        date: row.try_get("date")?,
        first_dose: row.try_get("first_dose")?,
        second_dose: row.try_get("second_dose")?,
        third_dose: row.try_get("third_dose")?,
    })
}

fn age_band_record(row: &PgRow) -> Result<AgeBandRecord> {
    let Json(payload): Json<Vec<AgeBandEntry>> = row.try_get("payload")?;
    Ok(AgeBandRecord {
        area_type: row.try_get("area_type")?,
        area_code: row.try_get("area_code")?,
        date: row.try_get("date")?,
        payload,
    })
}
