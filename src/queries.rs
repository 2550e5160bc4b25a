//! SQL for the homepage graph queries
//!
//! Time series tables are partitioned by release date; `{partition}` is
//! substituted before execution because table names cannot be bound.

use chrono::NaiveDate;

/// Smoothing input for a headline thumbnail, newest first.
///
/// Binds: `$1` partition id, `$2` metric.
pub const TIMESERIES_QUERY: &str = r#"
SELECT
     date                         AS "date",
     (payload ->> 'value')::FLOAT AS "value"
FROM covid19.time_series_p{partition} AS main
JOIN covid19.release_reference AS rr ON rr.id = release_id
JOIN covid19.metric_reference  AS mr ON mr.id = metric_id
JOIN covid19.area_reference    AS ar ON ar.id = main.area_id
WHERE
      partition_id = $1
  AND area_type = 'overview'
  AND date > ( NOW() - INTERVAL '6 months' )
  AND metric = $2
ORDER BY date DESC
"#;

/// Most recent value of a `<metric>Change` series.
///
/// Binds: `$1` partition id, `$2` release date, `$3` change metric.
pub const LATEST_CHANGE_QUERY: &str = r#"
SELECT
     metric,
     date                        AS "date",
     (payload -> 'value')::FLOAT AS "value"
FROM covid19.time_series_p{partition} AS ts
JOIN covid19.release_reference AS rr ON rr.id = release_id
JOIN covid19.metric_reference  AS mr ON mr.id = metric_id
JOIN covid19.area_reference    AS ar ON ar.id = ts.area_id
WHERE
      partition_id = $1
  AND area_type = 'overview'
  AND date > ( DATE( $2 ) - INTERVAL '30 days' )
  AND metric = $3
ORDER BY date DESC
OFFSET 0
FETCH FIRST 1 ROW ONLY
"#;

/// Latest first, second and third dose uptake per area over the last 20 days.
///
/// Binds: `$1` release date.
pub const VACCINATIONS_QUERY: &str = r#"
WITH ts AS (
    SELECT area_type, area_code, date, metric, (payload -> 'value')::FLOAT AS value
    FROM covid19.time_series_p{partition}_other AS tm
    JOIN covid19.metric_reference AS mr ON mr.id = tm.metric_id
    JOIN covid19.area_reference   AS ar ON ar.id = tm.area_id
    WHERE (payload ->> 'value') NOTNULL
    UNION
    SELECT area_type, area_code, date, metric, (payload -> 'value')::FLOAT AS value
    FROM covid19.time_series_p{partition}_utla AS tm
    JOIN covid19.metric_reference AS mr ON mr.id = tm.metric_id
    JOIN covid19.area_reference   AS ar ON ar.id = tm.area_id
    WHERE (payload ->> 'value') NOTNULL
    UNION
    SELECT area_type, area_code, date, metric, (payload -> 'value')::FLOAT AS value
    FROM covid19.time_series_p{partition}_ltla AS tm
    JOIN covid19.metric_reference AS mr ON mr.id = tm.metric_id
    JOIN covid19.area_reference   AS ar ON ar.id = tm.area_id
    WHERE (payload ->> 'value') NOTNULL
),
latest AS (
    SELECT area_type, area_code, metric, MAX(date) AS date, MAX(value) AS value
    FROM ts
    WHERE date > ( DATE( $1 ) - INTERVAL '20 days' )
    GROUP BY area_type, area_code, metric
)
SELECT first.area_type,
       first.area_code,
       first.date,
       FLOOR(first.value)::INT  AS first_dose,
       FLOOR(second.value)::INT AS second_dose,
       FLOOR(third.value)::INT  AS third_dose
FROM latest AS first
JOIN latest AS second
  ON second.area_code = first.area_code
 AND second.date = first.date
 AND second.metric = 'cumVaccinationSecondDoseUptakeByPublishDatePercentage'
JOIN latest AS third
  ON third.area_code = first.area_code
 AND third.date = first.date
 AND third.metric = 'cumVaccinationThirdInjectionUptakeByPublishDatePercentage'
WHERE first.metric = 'cumVaccinationFirstDoseUptakeByPublishDatePercentage'
"#;

/// Age-banded autumn booster payloads per area and date. Rows are not
/// reduced; callers keep the latest per area.
pub const VACCINATIONS_QUERY_50_PLUS: &str = r#"
SELECT area_type, area_code, date, payload
FROM (
    SELECT area_type, area_code, date, payload
    FROM covid19.time_series_p{partition}_other AS tm
    JOIN covid19.metric_reference AS mr ON mr.id = tm.metric_id
    JOIN covid19.area_reference   AS ar ON ar.id = tm.area_id
    WHERE metric = 'vaccinationsAgeDemographics'
    UNION ALL
    SELECT area_type, area_code, date, payload
    FROM covid19.time_series_p{partition}_utla AS tm
    JOIN covid19.metric_reference AS mr ON mr.id = tm.metric_id
    JOIN covid19.area_reference   AS ar ON ar.id = tm.area_id
    WHERE metric = 'vaccinationsAgeDemographics'
    UNION ALL
    SELECT area_type, area_code, date, payload
    FROM covid19.time_series_p{partition}_ltla AS tm
    JOIN covid19.metric_reference AS mr ON mr.id = tm.metric_id
    JOIN covid19.area_reference   AS ar ON ar.id = tm.area_id
    WHERE metric = 'vaccinationsAgeDemographics'
) AS demographics
WHERE jsonb_typeof(payload) = 'array'
"#;

/// Partition suffix for a release date, e.g. `2022_8_10`
pub fn partition_date(date: NaiveDate) -> String {
    date.format("%Y_%-m_%-d").to_string()
}

/// Table suffix of the `other` partition, e.g. `2022_8_10_other`
pub fn other_partition(date: NaiveDate) -> String {
    format!("{}_other", partition_date(date))
}

/// Partition id column value for the `other` partition, e.g. `2022_8_10|other`
pub fn other_partition_id(date: NaiveDate) -> String {
    format!("{}|other", partition_date(date))
}

/// Substitute the partition into a query template
pub fn render(template: &str, partition: &str) -> String {
    template.replace("{partition}", partition)
}
