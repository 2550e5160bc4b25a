//! Shaping of query rows into chart renderer inputs

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{AgeBandRecord, ChangeRecord, TimeseriesPoint, VaccinationRecord};

/// Age band the autumn booster waffle is drawn for
pub const FIFTY_PLUS_AGE_BAND: &str = "50+";

/// Points in the highlighted "recent" segment of a thumbnail
pub const RECENT_POINTS: usize = 14;

/// Width of the centred rolling mean
pub const ROLLING_WINDOW: usize = 7;

/// Headline metrics with a known direction of improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    NewCasesByPublishDate,
    NewDeaths28DaysByPublishDate,
    NewPcrTestsByPublishDate,
    NewAdmissions,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::NewCasesByPublishDate,
        Metric::NewDeaths28DaysByPublishDate,
        Metric::NewPcrTestsByPublishDate,
        Metric::NewAdmissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::NewCasesByPublishDate => "newCasesByPublishDate",
            Metric::NewDeaths28DaysByPublishDate => "newDeaths28DaysByPublishDate",
            Metric::NewPcrTestsByPublishDate => "newPCRTestsByPublishDate",
            Metric::NewAdmissions => "newAdmissions",
        }
    }

    /// Whether a change of this size is an improvement.
    ///
    /// `None` means the metric has no preferred direction.
    pub fn is_improving(&self, change: f64) -> Option<bool> {
        match self {
            Metric::NewCasesByPublishDate
            | Metric::NewDeaths28DaysByPublishDate
            | Metric::NewAdmissions => Some(change < 0.0),
            Metric::NewPcrTestsByPublishDate => None,
        }
    }

    /// Colour class for the latest change; exactly zero is neutral
    pub fn trend(&self, change: &ChangeRecord) -> Trend {
        if change.value == 0.0 {
            return Trend::Neutral;
        }
        match self.is_improving(change.value) {
            Some(true) => Trend::Good,
            Some(false) => Trend::Bad,
            None => Trend::Neutral,
        }
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| AppError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the latest change, as shown by thumbnail colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Good,
    Bad,
    Neutral,
}

/// Line and fill colours for a trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendColours {
    pub line: &'static str,
    pub fill: &'static str,
}

impl Trend {
    pub fn colours(&self) -> TrendColours {
        match self {
            Trend::Good => TrendColours {
                line: "rgba(0,90,48,1)",
                fill: "rgba(204,226,216,1)",
            },
            Trend::Bad => TrendColours {
                line: "rgba(148,37,20,1)",
                fill: "rgba(246,215,210,1)",
            },
            Trend::Neutral => TrendColours {
                line: "rgba(56,63,67,1)",
                fill: "rgba(235,233,231,1)",
            },
        }
    }
}

/// Colour the thumbnail for `metric_name` from its latest change.
///
/// Fails with `UnknownMetric` when the metric is not in the improvement table.
/// A change of exactly zero is always neutral.
pub fn trend(metric_name: &str, change: &ChangeRecord) -> Result<Trend> {
    let metric: Metric = metric_name.parse()?;
    Ok(metric.trend(change))
}

/// Values a waffle chart is drawn from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaffleInput {
    pub area_type: String,
    pub area_code: String,
    pub date: NaiveDate,
    pub values: WaffleValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WaffleValues {
    /// All-ages uptake percentages per dose
    Doses {
        first_dose: i32,
        second_dose: i32,
        third_dose: i32,
    },
    /// Autumn booster totals for the 50+ age band
    FiftyPlus {
        vaccination_date: i64,
        vaccination_date_percentage_dose: i64,
    },
}

impl From<&VaccinationRecord> for WaffleInput {
    fn from(record: &VaccinationRecord) -> Self {
        Self {
            area_type: record.area_type.clone(),
            area_code: record.area_code.clone(),
            date: record.date,
            values: WaffleValues::Doses {
                first_dose: record.first_dose,
                second_dose: record.second_dose,
                third_dose: record.third_dose,
            },
        }
    }
}

/// Extract the 50+ booster values from an age-banded record.
///
/// The last `50+` entry wins; absent values and a missing band are zero.
pub fn extract_50_plus(record: &AgeBandRecord) -> WaffleInput {
    let mut vaccination_date = 0;
    let mut vaccination_date_percentage_dose = 0;

    for entry in &record.payload {
        if entry.age.as_deref() == Some(FIFTY_PLUS_AGE_BAND) {
            vaccination_date = round_to_int(entry.cum_people_vaccinated);
            vaccination_date_percentage_dose = round_to_int(entry.cum_uptake_percentage);
        }
    }

    WaffleInput {
        area_type: record.area_type.clone(),
        area_code: record.area_code.clone(),
        date: record.date,
        values: WaffleValues::FiftyPlus {
            vaccination_date,
            vaccination_date_percentage_dose,
        },
    }
}

/// Nearest integer, halves to even
fn round_to_int(value: Option<f64>) -> i64 {
    value.map(|v| v.round_ties_even() as i64).unwrap_or(0)
}

/// Smoothed headline series split into the highlighted recent segment and the
/// older history.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSeries {
    /// Newest first
    pub dates: Vec<NaiveDate>,
    /// Centred rolling mean; `None` where the window is incomplete
    pub smoothed: Vec<Option<f64>>,
}

impl ThumbnailSeries {
    /// Build from points ordered newest first.
    pub fn from_points(points: &[TimeseriesPoint]) -> Self {
        let values: Vec<Option<f64>> = points.iter().map(|p| p.value).collect();
        Self {
            dates: points.iter().map(|p| p.date).collect(),
            smoothed: centred_rolling_mean(&values, ROLLING_WINDOW),
        }
    }

    /// The first `RECENT_POINTS` points
    pub fn recent(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.points().take(RECENT_POINTS)
    }

    /// Everything from the last recent point onwards, so both traces join
    pub fn history(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.points().skip(RECENT_POINTS - 1)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn points(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.smoothed.iter().copied())
    }
}

/// Centred rolling mean. A window with any missing value yields `None`.
fn centred_rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let before = window / 2;
    let after = window - 1 - before;

    (0..values.len())
        .map(|i| {
            if i < before || i + after >= values.len() {
                return None;
            }
            let slice = &values[i - before..=i + after];
            let sum = slice.iter().copied().sum::<Option<f64>>()?;
            Some(sum / window as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgeBandEntry;

    fn change(value: f64) -> ChangeRecord {
        ChangeRecord {
            metric: "newDeaths28DaysByPublishDateChange".into(),
            date: NaiveDate::from_ymd_opt(2022, 8, 9).unwrap(),
            value,
        }
    }

    fn entry(age: &str, people: Option<f64>, pct: Option<f64>) -> AgeBandEntry {
        AgeBandEntry {
            age: Some(age.to_string()),
            cum_people_vaccinated: people,
            cum_uptake_percentage: pct,
        }
    }

    fn age_record(payload: Vec<AgeBandEntry>) -> AgeBandRecord {
        AgeBandRecord {
            area_type: "ltla".into(),
            area_code: "E06000001".into(),
            date: NaiveDate::from_ymd_opt(2022, 8, 10).unwrap(),
            payload,
        }
    }

    fn fifty_plus(input: &WaffleInput) -> (i64, i64) {
        match input.values {
            WaffleValues::FiftyPlus {
                vaccination_date,
                vaccination_date_percentage_dose,
            } => (vaccination_date, vaccination_date_percentage_dose),
            other => panic!("unexpected values: {:?}", other),
        }
    }

    #[test]
    fn test_trend_for_deaths() {
        let metric = "newDeaths28DaysByPublishDate";
        assert_eq!(trend(metric, &change(-5.0)).unwrap(), Trend::Good);
        assert_eq!(trend(metric, &change(5.0)).unwrap(), Trend::Bad);
        assert_eq!(trend(metric, &change(0.0)).unwrap(), Trend::Neutral);
    }

    #[test]
    fn test_trend_without_direction_is_neutral() {
        assert_eq!(
            trend("newPCRTestsByPublishDate", &change(-12.0)).unwrap(),
            Trend::Neutral
        );
        assert_eq!(
            trend("newPCRTestsByPublishDate", &change(12.0)).unwrap(),
            Trend::Neutral
        );
    }

    #[test]
    fn test_trend_unknown_metric_fails() {
        let err = trend("newVirusTestsByPublishDate", &change(1.0)).unwrap_err();
        assert!(matches!(err, AppError::UnknownMetric(name) if name == "newVirusTestsByPublishDate"));
    }

    #[test]
    fn test_trend_unknown_metric_fails_even_on_zero() {
        assert!(trend("newCasesBySpecimenDate", &change(0.0)).is_err());
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>().unwrap(), metric);
        }
        assert!("newadmissions".parse::<Metric>().is_err());
    }

    #[test]
    fn test_trend_colours() {
        assert_eq!(Trend::Good.colours().line, "rgba(0,90,48,1)");
        assert_eq!(Trend::Bad.colours().fill, "rgba(246,215,210,1)");
        assert_eq!(Trend::Neutral.colours().line, "rgba(56,63,67,1)");
    }

    #[test]
    fn test_extract_50_plus() {
        let record = age_record(vec![
            entry("40-49", Some(999.0), Some(50.0)),
            entry("50+", Some(12345.6), Some(78.4)),
        ]);
        assert_eq!(fifty_plus(&extract_50_plus(&record)), (12346, 78));
    }

    #[test]
    fn test_extract_50_plus_missing_band_is_zero() {
        let record = age_record(vec![entry("40-49", Some(999.0), Some(50.0))]);
        let input = extract_50_plus(&record);
        assert_eq!(fifty_plus(&input), (0, 0));
        assert_eq!(input.area_code, "E06000001");
    }

    #[test]
    fn test_extract_50_plus_absent_values_are_zero() {
        let record = age_record(vec![entry("50+", None, Some(13.5))]);
        assert_eq!(fifty_plus(&extract_50_plus(&record)), (0, 14));
    }

    #[test]
    fn test_extract_50_plus_ties_round_to_even() {
        let record = age_record(vec![entry("50+", Some(12.5), Some(78.5))]);
        assert_eq!(fifty_plus(&extract_50_plus(&record)), (12, 78));

        let record = age_record(vec![entry("50+", Some(12345.5), Some(0.5))]);
        assert_eq!(fifty_plus(&extract_50_plus(&record)), (12346, 0));
    }

    #[test]
    fn test_extract_50_plus_last_entry_wins() {
        let record = age_record(vec![
            entry("50+", Some(1.0), Some(1.0)),
            entry("65+", Some(7.0), Some(7.0)),
            entry("50+", Some(2.2), None),
        ]);
        assert_eq!(fifty_plus(&extract_50_plus(&record)), (2, 0));
    }

    #[test]
    fn test_waffle_from_vaccination_record() {
        let record = VaccinationRecord {
            area_type: "nation".into(),
            area_code: "E92000001".into(),
            date: NaiveDate::from_ymd_opt(2022, 8, 10).unwrap(),
            first_dose: 93,
            second_dose: 88,
            third_dose: 70,
        };
        let input = WaffleInput::from(&record);
        assert_eq!(
            input.values,
            WaffleValues::Doses {
                first_dose: 93,
                second_dose: 88,
                third_dose: 70
            }
        );
    }

    #[test]
    fn test_rolling_mean_is_centred() {
        let values: Vec<Option<f64>> = (1..=9).map(|v| Some(v as f64)).collect();
        let mean = centred_rolling_mean(&values, 7);
        assert!(mean[..3].iter().all(Option::is_none));
        assert_eq!(mean[3], Some(4.0));
        assert_eq!(mean[4], Some(5.0));
        assert_eq!(mean[5], Some(6.0));
        assert!(mean[6..].iter().all(Option::is_none));
    }

    #[test]
    fn test_rolling_mean_missing_value_poisons_window() {
        let mut values: Vec<Option<f64>> = (1..=8).map(|v| Some(v as f64)).collect();
        values[0] = None;
        let mean = centred_rolling_mean(&values, 7);
        assert_eq!(mean[3], None);
        assert_eq!(mean[4], Some(5.0));
    }

    #[test]
    fn test_thumbnail_segments_overlap_by_one() {
        let start = NaiveDate::from_ymd_opt(2022, 8, 10).unwrap();
        let points: Vec<TimeseriesPoint> = (0..30)
            .map(|i| TimeseriesPoint {
                date: start - chrono::Duration::days(i),
                value: Some(i as f64),
            })
            .collect();

        let series = ThumbnailSeries::from_points(&points);
        let recent: Vec<_> = series.recent().collect();
        let history: Vec<_> = series.history().collect();

        assert_eq!(series.len(), 30);
        assert_eq!(recent.len(), RECENT_POINTS);
        assert_eq!(history.len(), 30 - (RECENT_POINTS - 1));
        assert_eq!(recent.last(), history.first());
        assert_eq!(recent[0].0, start);
    }
}
