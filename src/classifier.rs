//! Classification of intermediate pipeline files by storage path
//!
//! Intermediate files live under `etl/<category>/[<subcategory>/]<YYYY-MM-DD>/<name>.ft`.
//! An empty subcategory segment (`etl/<category>//<date>/...`) reads as no subcategory.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::models::ClassifiedPath;

/// Prefix all intermediate files are stored under
pub const INTERMEDIATE_PREFIX: &str = "etl/";

static INTERMEDIATE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?xi)
        ^
        (?P<from_path>
            etl/
            (?P<category>[a-z-]+)/
            (?:(?P<subcategory>[a-z-]+)?/)?
            (?P<date>[0-9]{4}-[0-9]{2}-[0-9]{2})/
            (?P<filename>.+\.ft)
        )
        $
        ",
    )
    .expect("intermediate path pattern is valid")
});

/// Parse a storage path into its typed fields.
///
/// Returns `None` when the path is not an intermediate file, including paths
/// whose date segment has the right digits but is not a calendar date.
pub fn classify(path: &str) -> Option<ClassifiedPath> {
    let caps = INTERMEDIATE_PATH.captures(path)?;

    let date = caps.name("date")?.as_str();
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

    Some(ClassifiedPath {
        from_path: caps.name("from_path")?.as_str().to_string(),
        category: caps.name("category")?.as_str().to_string(),
        subcategory: caps.name("subcategory").map(|m| m.as_str().to_string()),
        date: date.to_string(),
        filename: caps.name("filename")?.as_str().to_string(),
    })
}
