//! Core domain models for the homepage ETL

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Content type assumed for blobs the store has no metadata for
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Which group of homepage charts an invocation produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Headline metric thumbnails
    #[default]
    Main,
    /// Vaccination waffle charts
    Vaccination,
}

/// Invocation payload for the homepage graphs pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphsPayload {
    /// Release date the charts are built for
    pub date: NaiveDate,
    #[serde(default)]
    pub category: Category,
}

/// Invocation payload for the housekeeping retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverPayload {
    /// ISO-8601 trigger timestamp
    pub timestamp: String,
}

impl RetrieverPayload {
    /// Parse the trigger timestamp.
    ///
    /// Accepts RFC 3339 (offset is dropped, wall-clock time is kept), naive
    /// date-times with a `T` or space separator (seconds optional), and bare
    /// calendar dates.
    pub fn trigger_time(&self) -> Result<NaiveDateTime> {
        let raw = self.timestamp.trim();

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.naive_local());
        }
        for format in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(ts);
            }
        }
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
        date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::InvalidPayload(format!("Invalid timestamp: {}", raw)))
    }
}

/// Dose uptake for one area, as returned by the all-ages vaccinations query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub area_type: String,
    pub area_code: String,
    pub date: NaiveDate,
    pub first_dose: i32,
    pub second_dose: i32,
    pub third_dose: i32,
}

/// One age band inside an age-demographics payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeBandEntry {
    #[serde(default)]
    pub age: Option<String>,
    #[serde(
        default,
        rename = "cumPeopleVaccinatedAutumn22ByVaccinationDate"
    )]
    pub cum_people_vaccinated: Option<f64>,
    #[serde(
        default,
        rename = "cumVaccinationAutumn22UptakeByVaccinationDatePercentage"
    )]
    pub cum_uptake_percentage: Option<f64>,
}

/// Age-banded vaccination payload for one area on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBandRecord {
    pub area_type: String,
    pub area_code: String,
    pub date: NaiveDate,
    pub payload: Vec<AgeBandEntry>,
}

/// A single value of a headline time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Latest value of a `<metric>Change` series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub metric: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// A storage path that has been classified as an intermediate file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedPath {
    pub from_path: String,
    pub category: String,
    pub subcategory: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    pub filename: String,
}

/// An archival candidate handed to the downstream archiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiverPayload {
    pub from_path: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub date: String,
    pub filename: String,
    pub content_type: String,
}

impl ArchiverPayload {
    pub fn new(path: ClassifiedPath, content_type: Option<&str>) -> Self {
        Self {
            from_path: path.from_path,
            category: path.category,
            subcategory: path.subcategory,
            date: path.date,
            filename: path.filename,
            content_type: content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
        }
    }
}
