//! Chart renderer seam and the SVG markup writer used in production

use std::fmt::Write;

use crate::chart::{ThumbnailSeries, Trend, WaffleInput, WaffleValues, RECENT_POINTS};
use crate::error::{AppError, Result};

/// Turns shaped chart inputs into an image payload
pub trait ChartRenderer: Send + Sync {
    fn thumbnail(&self, series: &ThumbnailSeries, trend: Trend) -> Result<String>;

    fn waffle(&self, input: &WaffleInput) -> Result<String>;
}

const THUMBNAIL_WIDTH: f64 = 500.0;
const THUMBNAIL_HEIGHT: f64 = 150.0;
const WAFFLE_CELLS: usize = 10;
const WAFFLE_CELL: f64 = 30.0;
const WAFFLE_GAP: f64 = 4.0;
const WAFFLE_EMPTY: &str = "rgba(231,231,231,1)";
const WAFFLE_FILLS: [&str; 3] = ["rgba(0,90,48,1)", "rgba(0,156,145,1)", "rgba(204,226,216,1)"];

/// Writes plain SVG markup: polylines for thumbnails, a 10x10 grid for waffles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRenderer;

impl SvgRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ChartRenderer for SvgRenderer {
    fn thumbnail(&self, series: &ThumbnailSeries, trend: Trend) -> Result<String> {
        if series.is_empty() {
            return Err(AppError::RenderError("Empty time series".into()));
        }

        let values: Vec<f64> = series.smoothed.iter().flatten().copied().collect();
        let max = values.iter().copied().fold(0.0_f64, f64::max);
        let scale_y = if max > 0.0 { THUMBNAIL_HEIGHT / max } else { 0.0 };
        let step_x = if series.len() > 1 {
            THUMBNAIL_WIDTH / (series.len() - 1) as f64
        } else {
            0.0
        };

        // Newest point is drawn on the right
        let to_xy = |index: usize, value: f64| {
            let x = THUMBNAIL_WIDTH - index as f64 * step_x;
            let y = THUMBNAIL_HEIGHT - value * scale_y;
            format!("{:.1},{:.1}", x, y)
        };

        let history: Vec<String> = series
            .history()
            .enumerate()
            .filter_map(|(i, (_, v))| v.map(|v| to_xy(i + RECENT_POINTS - 1, v)))
            .collect();
        let recent: Vec<String> = series
            .recent()
            .enumerate()
            .filter_map(|(i, (_, v))| v.map(|v| to_xy(i, v)))
            .collect();

        let neutral = Trend::Neutral.colours();
        let colours = trend.colours();
        let mut svg = String::new();
        write_svg(&mut svg, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, |svg| {
            write!(
                svg,
                r#"<polyline fill="none" stroke="{}" stroke-width="2" points="{}"/>"#,
                neutral.line,
                history.join(" ")
            )?;
            if let (Some(first), Some(last)) = (recent.first(), recent.last()) {
                let (first_x, _) = first.split_once(',').unwrap_or((first.as_str(), ""));
                let (last_x, _) = last.split_once(',').unwrap_or((last.as_str(), ""));
                write!(
                    svg,
                    r#"<polygon fill="{}" fill-opacity="0.5" stroke="{}" stroke-width="2" points="{},{:.1} {} {},{:.1}"/>"#,
                    colours.fill,
                    colours.line,
                    first_x,
                    THUMBNAIL_HEIGHT,
                    recent.join(" "),
                    last_x,
                    THUMBNAIL_HEIGHT
                )?;
            }
            Ok(())
        })?;
        Ok(svg)
    }

    fn waffle(&self, input: &WaffleInput) -> Result<String> {
        let percentages: Vec<i64> = match input.values {
            WaffleValues::Doses {
                first_dose,
                second_dose,
                third_dose,
            } => vec![first_dose.into(), second_dose.into(), third_dose.into()],
            WaffleValues::FiftyPlus {
                vaccination_date_percentage_dose,
                ..
            } => vec![vaccination_date_percentage_dose],
        };

        // Each cell is one percent; later doses are drawn over earlier ones
        let total = WAFFLE_CELLS * WAFFLE_CELLS;
        let mut cells = vec![WAFFLE_EMPTY; total];
        for (layer, pct) in percentages.iter().enumerate() {
            let filled = (*pct).clamp(0, total as i64) as usize;
            let fill = WAFFLE_FILLS[layer.min(WAFFLE_FILLS.len() - 1)];
            for cell in cells.iter_mut().take(filled) {
                *cell = fill;
            }
        }

        let side = WAFFLE_CELLS as f64 * (WAFFLE_CELL + WAFFLE_GAP);
        let mut svg = String::new();
        write_svg(&mut svg, side, side, |svg| {
            for (i, fill) in cells.iter().enumerate() {
                let row = (i / WAFFLE_CELLS) as f64;
                let col = (i % WAFFLE_CELLS) as f64;
                write!(
                    svg,
                    r#"<rect x="{:.0}" y="{:.0}" width="{:.0}" height="{:.0}" fill="{}"/>"#,
                    col * (WAFFLE_CELL + WAFFLE_GAP),
                    // Fill from the bottom row up
                    side - (row + 1.0) * (WAFFLE_CELL + WAFFLE_GAP),
                    WAFFLE_CELL,
                    WAFFLE_CELL,
                    fill
                )?;
            }
            Ok(())
        })?;
        Ok(svg)
    }
}

fn write_svg<F>(out: &mut String, width: f64, height: f64, body: F) -> Result<()>
where
    F: FnOnce(&mut String) -> std::fmt::Result,
{
    let wrap = |out: &mut String| -> std::fmt::Result {
        write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}">"#,
            width, height, width, height
        )?;
        body(out)?;
        out.push_str("</svg>");
        Ok(())
    };
    wrap(out).map_err(|e| AppError::RenderError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeseriesPoint;
    use chrono::{Duration, NaiveDate};

    fn series(len: i64) -> ThumbnailSeries {
        let start = NaiveDate::from_ymd_opt(2022, 8, 10).unwrap();
        let points: Vec<TimeseriesPoint> = (0..len)
            .map(|i| TimeseriesPoint {
                date: start - Duration::days(i),
                value: Some(100.0 + i as f64),
            })
            .collect();
        ThumbnailSeries::from_points(&points)
    }

    #[test]
    fn test_thumbnail_uses_trend_colours() {
        let svg = SvgRenderer::new().thumbnail(&series(40), Trend::Bad).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(Trend::Bad.colours().fill));
        assert!(svg.contains(Trend::Neutral.colours().line));
    }

    #[test]
    fn test_thumbnail_rejects_empty_series() {
        let empty = ThumbnailSeries::from_points(&[]);
        assert!(matches!(
            SvgRenderer::new().thumbnail(&empty, Trend::Good),
            Err(AppError::RenderError(_))
        ));
    }

    #[test]
    fn test_waffle_has_one_cell_per_percent() {
        let input = WaffleInput {
            area_type: "ltla".into(),
            area_code: "E06000001".into(),
            date: NaiveDate::from_ymd_opt(2022, 8, 10).unwrap(),
            values: WaffleValues::FiftyPlus {
                vaccination_date: 12346,
                vaccination_date_percentage_dose: 78,
            },
        };
        let svg = SvgRenderer::new().waffle(&input).unwrap();
        assert_eq!(svg.matches("<rect").count(), 100);
        assert_eq!(svg.matches(WAFFLE_FILLS[0]).count(), 78);
        assert_eq!(svg.matches(WAFFLE_EMPTY).count(), 22);
    }

    #[test]
    fn test_waffle_layers_doses() {
        let input = WaffleInput {
            area_type: "nation".into(),
            area_code: "E92000001".into(),
            date: NaiveDate::from_ymd_opt(2022, 8, 10).unwrap(),
            values: WaffleValues::Doses {
                first_dose: 90,
                second_dose: 80,
                third_dose: 60,
            },
        };
        let svg = SvgRenderer::new().waffle(&input).unwrap();
        assert_eq!(svg.matches(WAFFLE_FILLS[2]).count(), 60);
        assert_eq!(svg.matches(WAFFLE_FILLS[1]).count(), 20);
        assert_eq!(svg.matches(WAFFLE_FILLS[0]).count(), 10);
        assert_eq!(svg.matches(WAFFLE_EMPTY).count(), 10);
    }
}
