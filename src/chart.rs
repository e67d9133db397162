// Bar chart rendering for aggregate series.
//
// Charts are drawn with plotters into an in-memory RGB buffer and encoded
// as PNG, so nothing touches the filesystem until the caller decides to.
use crate::config::ChartStyle;
use crate::error::{ReportError, Result};
use crate::reports::{AggregateSeries, SeriesOutcome};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::cmp::Ordering;
use std::error::Error;
use tracing::{debug, info};

pub const NO_DATA_NOTICE: &str = "No data available for this chart.";

/// A rendered chart, ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub title: String,
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Rendered(ChartImage),
    NoData { title: String, notice: String },
}

impl ChartOutcome {
    fn no_data(title: &str, notice: String) -> Self {
        ChartOutcome::NoData { title: title.to_string(), notice }
    }
}

/// Render a computed or skipped series. Skipped and empty series yield a
/// notice instead of an image.
pub fn render_outcome(outcome: &SeriesOutcome, style: &ChartStyle) -> Result<ChartOutcome> {
    match outcome {
        SeriesOutcome::Computed(series) => render_series(series, style),
        SeriesOutcome::Skipped { name, missing } => {
            let names: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
            Ok(ChartOutcome::no_data(
                name,
                format!("{} Missing column(s): {}.", NO_DATA_NOTICE, names.join(", ")),
            ))
        }
    }
}

/// Bars are sorted ascending by value and annotated with their value.
pub fn render_series(series: &AggregateSeries, style: &ChartStyle) -> Result<ChartOutcome> {
    if series.is_empty() {
        debug!(series = %series.name, "no data to chart");
        return Ok(ChartOutcome::no_data(&series.name, NO_DATA_NOTICE.to_string()));
    }

    let points = bar_points(series);

    let (w, h) = (style.width_px, style.height_px);
    let mut buffer = vec![0u8; (w as usize) * (h as usize) * 3];
    draw_bars(&mut buffer, series, &points, style).map_err(|e| ReportError::Chart {
        title: series.name.clone(),
        message: e.to_string(),
    })?;

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&buffer, w, h, ExtendedColorType::Rgb8)?;
    info!(series = %series.name, bars = points.len(), bytes = png.len(), "chart rendered");
    Ok(ChartOutcome::Rendered(ChartImage {
        title: series.name.clone(),
        png,
        width_px: w,
        height_px: h,
    }))
}

/// Bars in drawing order (ascending by value) with their annotation text.
fn bar_points(series: &AggregateSeries) -> Vec<(String, f64, String)> {
    let mut points: Vec<(String, f64, String)> = series
        .points
        .iter()
        .map(|(label, v)| (label.clone(), *v, series.format_value(*v)))
        .collect();
    points.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    points
}

fn draw_bars(
    buffer: &mut [u8],
    series: &AggregateSeries,
    points: &[(String, f64, String)],
    style: &ChartStyle,
) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buffer, (style.width_px, style.height_px))
        .into_drawing_area();
    root.fill(&WHITE)?;

    let max = points.iter().map(|p| p.1).fold(0.0_f64, f64::max);
    let min = points.iter().map(|p| p.1).fold(0.0_f64, f64::min);
    // Headroom above the tallest bar for its annotation.
    let y_top = if max > 0.0 { max * 1.15 } else { 1.0 };
    let y_bottom = if min < 0.0 { min * 1.15 } else { 0.0 };

    let labels: Vec<&str> = points.iter().map(|p| p.0.as_str()).collect();
    let n = points.len() as i32;
    let family = style.font_family.as_str();
    let bar_color = RGBColor(style.bar_color.0, style.bar_color.1, style.bar_color.2);

    let mut chart = ChartBuilder::on(&root)
        .caption(&series.name, (family, style.title_font_px))
        .margin(style.margin_px)
        .x_label_area_size(style.x_label_area_px)
        .y_label_area_size(style.y_label_area_px)
        .build_cartesian_2d((0..n).into_segmented(), y_bottom..y_top)?;

    let x_label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => labels
            .get(*i as usize)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(points.len())
        .x_label_formatter(&x_label)
        .x_label_style(
            (family, style.label_font_px)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_desc(style.y_caption.as_str())
        .draw()?;

    chart.draw_series(points.iter().enumerate().map(|(i, (_, v, _))| {
        let i = i as i32;
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
            bar_color.filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    let annotation = TextStyle::from((family, style.annotation_font_px).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(points.iter().enumerate().map(|(i, (_, v, text))| {
        Text::new(
            text.clone(),
            (SegmentValue::CenterOf(i as i32), *v),
            annotation.clone(),
        )
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Aggregate;
    use crate::types::Field;

    fn series(points: Vec<(&str, f64)>) -> AggregateSeries {
        AggregateSeries {
            name: "PO Count by User: Approved".to_string(),
            aggregate: Aggregate::Count,
            points: points.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[test]
    fn count_bars_ascend_with_integer_labels() {
        let bars = bar_points(&series(vec![("Kim", 1204.0), ("Lee", 2.0), ("Ortiz", 35.0)]));
        assert_eq!(
            bars,
            vec![
                ("Lee".to_string(), 2.0, "2".to_string()),
                ("Ortiz".to_string(), 35.0, "35".to_string()),
                ("Kim".to_string(), 1204.0, "1,204".to_string()),
            ]
        );
    }

    #[test]
    fn mean_bars_ascend_with_two_decimal_labels() {
        let mean = AggregateSeries {
            name: "PO Avg Time by Company: Approved".to_string(),
            aggregate: Aggregate::MeanDuration,
            points: vec![("ACME".to_string(), 12.5), ("Globex".to_string(), 3.333)],
        };
        let bars = bar_points(&mean);
        let labels: Vec<&str> = bars.iter().map(|b| b.0.as_str()).collect();
        let texts: Vec<&str> = bars.iter().map(|b| b.2.as_str()).collect();
        assert_eq!(labels, vec!["Globex", "ACME"]);
        assert_eq!(texts, vec!["3.33", "12.50"]);
    }

    #[test]
    fn empty_series_gives_notice_and_no_image() {
        let out = render_series(&series(vec![]), &ChartStyle::default()).unwrap();
        assert_eq!(
            out,
            ChartOutcome::NoData {
                title: "PO Count by User: Approved".to_string(),
                notice: NO_DATA_NOTICE.to_string(),
            }
        );
    }

    #[test]
    fn skipped_series_names_missing_columns() {
        let skipped = SeriesOutcome::Skipped {
            name: "POs Cancelled/Deleted by Company".to_string(),
            missing: vec![Field::Company],
        };
        match render_outcome(&skipped, &ChartStyle::default()).unwrap() {
            ChartOutcome::NoData { title, notice } => {
                assert_eq!(title, "POs Cancelled/Deleted by Company");
                assert!(notice.contains("Company Code Decription"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn renders_png_of_configured_size() {
        let style = ChartStyle { width_px: 640, height_px: 320, ..ChartStyle::default() };
        let out = render_series(&series(vec![("Kim", 4.0), ("Lee", 2.0)]), &style).unwrap();
        let ChartOutcome::Rendered(img) = out else {
            panic!("expected an image");
        };
        assert_eq!(&img.png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((img.width_px, img.height_px), (640, 320));
        assert_eq!(img.title, "PO Count by User: Approved");
    }
}
