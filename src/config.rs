// Report profiles: the per-report knobs (status authority, duration source,
// delay rule, chart catalog) and the chart/slide styling, in one record.
//
// Profiles deserialize from TOML with every field defaulted, so a file only
// needs to spell out what differs from the general report.
use crate::error::Result;
use crate::types::{Field, PoRecord};
use serde::Deserialize;
use std::path::Path;

/// Where the "latest status" of a PO comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// Status of the row with the highest serial number per PO.
    SerialNumber,
    /// An authoritative "Latest Status" column in the export.
    LatestStatusColumn,
    /// "Overall Status" is already the current status.
    OverallStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// Days column if present, otherwise the creation/released date pair.
    Auto,
    DaysColumn,
    DateDifference,
}

/// Which field marks a row as an approval for the duration metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalBasis {
    ApproverAction,
    LatestStatus,
}

impl ApprovalBasis {
    pub fn field(self) -> Field {
        match self {
            ApprovalBasis::ApproverAction => Field::ApproverAction,
            ApprovalBasis::LatestStatus => Field::LatestStatus,
        }
    }

    pub fn is_approved(self, rec: &PoRecord) -> bool {
        let value = match self {
            ApprovalBasis::ApproverAction => rec.approver_action.as_deref(),
            ApprovalBasis::LatestStatus => rec.latest_status.as_deref(),
        };
        value == Some(APPROVED)
    }
}

pub const APPROVED: &str = "APPROVED";
pub const IN_PROGRESS: &str = "IN PROGRESS";
pub const CANCELLED: &str = "CANCELLED";
pub const DELETED: &str = "DELETED";

/// When an approval counts as delayed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayRule {
    /// `above < days <= up_to`
    Bounded { above: f64, up_to: f64 },
    /// `days > above`
    Open { above: f64 },
}

impl DelayRule {
    pub fn is_delayed(&self, days: f64) -> bool {
        match *self {
            DelayRule::Bounded { above, up_to } => days > above && days <= up_to,
            DelayRule::Open { above } => days > above,
        }
    }

    pub fn threshold(&self) -> f64 {
        match *self {
            DelayRule::Bounded { above, .. } | DelayRule::Open { above } => above,
        }
    }
}

impl Default for DelayRule {
    fn default() -> Self {
        DelayRule::Bounded { above: 10.0, up_to: 20.0 }
    }
}

/// Row predicate on the status columns. Values are compared upper-cased.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StatusFilter {
    LatestIs(String),
    OverallIs(String),
    OverallIn(Vec<String>),
    OverallContains(String),
}

impl StatusFilter {
    pub fn required_field(&self) -> Field {
        match self {
            StatusFilter::LatestIs(_) => Field::LatestStatus,
            _ => Field::OverallStatus,
        }
    }

    pub fn matches(&self, rec: &PoRecord) -> bool {
        match self {
            StatusFilter::LatestIs(v) => eq_upper(rec.latest_status.as_deref(), v),
            StatusFilter::OverallIs(v) => eq_upper(rec.overall_status.as_deref(), v),
            StatusFilter::OverallIn(vs) => vs
                .iter()
                .any(|v| eq_upper(rec.overall_status.as_deref(), v)),
            StatusFilter::OverallContains(v) => rec
                .overall_status
                .as_deref()
                .map_or(false, |s| s.contains(v.to_uppercase().as_str())),
        }
    }
}

fn eq_upper(status: Option<&str>, wanted: &str) -> bool {
    status.map_or(false, |s| s.eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    ApproverName,
    Company,
}

impl GroupBy {
    pub fn field(self) -> Field {
        match self {
            GroupBy::ApproverName => Field::ApproverName,
            GroupBy::Company => Field::Company,
        }
    }

    pub fn key(self, rec: &PoRecord) -> Option<&str> {
        match self {
            GroupBy::ApproverName => rec.approver_name.as_deref(),
            GroupBy::Company => rec.company.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    MeanDuration,
    Count,
}

impl Aggregate {
    pub fn field(self) -> Field {
        match self {
            Aggregate::MeanDuration => Field::Duration,
            Aggregate::Count => Field::PoNumber,
        }
    }
}

/// One entry of the chart catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesSpec {
    pub name: String,
    pub filter: StatusFilter,
    pub group_by: GroupBy,
    pub aggregate: Aggregate,
}

impl SeriesSpec {
    pub fn new(name: &str, filter: StatusFilter, group_by: GroupBy, aggregate: Aggregate) -> Self {
        SeriesSpec { name: name.to_string(), filter, group_by, aggregate }
    }

    pub fn required_fields(&self) -> [Field; 3] {
        [self.filter.required_field(), self.group_by.field(), self.aggregate.field()]
    }
}

/// The seven charts of the general report.
pub fn default_catalog() -> Vec<SeriesSpec> {
    let approved = || StatusFilter::LatestIs(APPROVED.to_string());
    let in_progress = || StatusFilter::OverallIs(IN_PROGRESS.to_string());
    let cancelled = StatusFilter::OverallIn(vec![CANCELLED.to_string(), DELETED.to_string()]);
    vec![
        SeriesSpec::new("PO Avg Time by User: Approved", approved(), GroupBy::ApproverName, Aggregate::MeanDuration),
        SeriesSpec::new("PO Count by User: Approved", approved(), GroupBy::ApproverName, Aggregate::Count),
        SeriesSpec::new("PO Count by User: In Progress", in_progress(), GroupBy::ApproverName, Aggregate::Count),
        SeriesSpec::new("PO Avg Time by User: In Progress", in_progress(), GroupBy::ApproverName, Aggregate::MeanDuration),
        SeriesSpec::new("POs Cancelled/Deleted by Company", cancelled, GroupBy::Company, Aggregate::Count),
        SeriesSpec::new("PO Avg Time by Company: Approved", approved(), GroupBy::Company, Aggregate::MeanDuration),
        SeriesSpec::new("PO Avg Time by Company: In Progress", in_progress(), GroupBy::Company, Aggregate::MeanDuration),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub width_px: u32,
    pub height_px: u32,
    pub bar_color: Rgb,
    pub font_family: String,
    pub title_font_px: u32,
    pub label_font_px: u32,
    pub annotation_font_px: u32,
    pub margin_px: u32,
    pub x_label_area_px: u32,
    pub y_label_area_px: u32,
    pub y_caption: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        ChartStyle {
            width_px: 1400,
            height_px: 500,
            bar_color: Rgb(31, 119, 180),
            font_family: "sans-serif".to_string(),
            title_font_px: 26,
            label_font_px: 13,
            annotation_font_px: 13,
            margin_px: 16,
            x_label_area_px: 150,
            y_label_area_px: 70,
            y_caption: "Value".to_string(),
        }
    }
}

/// A box on a slide, in inches from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoxIn {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeckStyle {
    pub slide_width_in: f64,
    pub slide_height_in: f64,
    pub title_box: BoxIn,
    pub title_font_pt: f64,
    pub title_bold: bool,
    pub dashboard_title: String,
    pub table_box: BoxIn,
    pub table_col_widths_in: [f64; 2],
    pub table_font_pt: f64,
    pub callout_boxes: [BoxIn; 2],
    pub callout_fill: Rgb,
    pub callout_text_color: Rgb,
    pub callout_font_pt: f64,
    pub chart_left_in: f64,
    pub chart_top_in: f64,
    pub chart_width_in: f64,
}

impl Default for DeckStyle {
    fn default() -> Self {
        DeckStyle {
            slide_width_in: 10.0,
            slide_height_in: 7.5,
            title_box: BoxIn { x: 0.5, y: 0.3, w: 9.0, h: 1.0 },
            title_font_pt: 24.0,
            title_bold: true,
            dashboard_title: "Purchase Order workflow output".to_string(),
            table_box: BoxIn { x: 0.5, y: 1.5, w: 8.5, h: 3.0 },
            table_col_widths_in: [5.0, 3.0],
            table_font_pt: 14.0,
            callout_boxes: [
                BoxIn { x: 0.5, y: 5.0, w: 4.0, h: 1.0 },
                BoxIn { x: 5.0, y: 5.0, w: 4.0, h: 1.0 },
            ],
            callout_fill: Rgb(199, 215, 238),
            callout_text_color: Rgb(0, 0, 0),
            callout_font_pt: 18.0,
            chart_left_in: 1.0,
            chart_top_in: 1.5,
            chart_width_in: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportProfile {
    pub name: String,
    pub status_source: StatusSource,
    pub duration_source: DurationSource,
    pub approval_basis: ApprovalBasis,
    pub delay_rule: DelayRule,
    pub outlier_cutoff_days: f64,
    pub catalog: Vec<SeriesSpec>,
    pub chart: ChartStyle,
    pub deck: DeckStyle,
}

impl Default for ReportProfile {
    fn default() -> Self {
        ReportProfile::general_report()
    }
}

impl ReportProfile {
    /// Multi-row export with serial numbers per approval step.
    pub fn general_report() -> Self {
        ReportProfile {
            name: "General Report".to_string(),
            status_source: StatusSource::SerialNumber,
            duration_source: DurationSource::Auto,
            approval_basis: ApprovalBasis::ApproverAction,
            delay_rule: DelayRule::default(),
            outlier_cutoff_days: 1000.0,
            catalog: default_catalog(),
            chart: ChartStyle::default(),
            deck: DeckStyle::default(),
        }
    }

    /// Export that already carries a "Latest Status" column; dashboard only.
    pub fn work_report() -> Self {
        ReportProfile {
            name: "Work Report".to_string(),
            status_source: StatusSource::LatestStatusColumn,
            duration_source: DurationSource::DaysColumn,
            catalog: Vec::new(),
            ..ReportProfile::general_report()
        }
    }

    /// One row per PO, durations from creation/released dates.
    pub fn release_report() -> Self {
        ReportProfile {
            name: "Release Report".to_string(),
            status_source: StatusSource::OverallStatus,
            duration_source: DurationSource::DateDifference,
            approval_basis: ApprovalBasis::LatestStatus,
            delay_rule: DelayRule::Open { above: 10.0 },
            ..ReportProfile::general_report()
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
