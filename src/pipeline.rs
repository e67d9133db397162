// One report session: load -> normalize -> resolve latest status -> metrics.
//
// The cleaned table is built once per load; dashboard and series are derived
// from it up front, charts and decks are rendered on demand from a selection.
use crate::chart::{render_outcome, ChartImage, ChartOutcome};
use crate::config::ReportProfile;
use crate::deck::{build_deck, slide_titles, ExportItem};
use crate::error::{ReportError, Result};
use crate::loader::{self, InputFormat, LoadReport};
use crate::normalize::{normalize, NormalizeReport};
use crate::reports::{compute_catalog, compute_dashboard, DashboardMetrics, SeriesOutcome};
use crate::status::{resolve_latest_status, Resolution};
use crate::types::{CleanTable, DashboardRow, RawTable};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

pub const DASHBOARD_OPTION: &str = "Dashboard Summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOption {
    Dashboard,
    /// Index into the profile's series catalog.
    Series(usize),
}

/// Validated, de-duplicated choice of outputs, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(Vec<OutputOption>);

impl Selection {
    pub fn options(&self) -> &[OutputOption] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn includes_dashboard(&self) -> bool {
        self.0.contains(&OutputOption::Dashboard)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Table(Vec<DashboardRow>),
    Chart(ChartImage),
    NoData(String),
}

#[derive(Debug, Clone)]
pub struct ExportedDeck {
    pub bytes: Vec<u8>,
    pub slide_titles: Vec<String>,
    /// Selected series left out of the deck, with the reason.
    pub notices: Vec<String>,
}

/// What gets written next to the deck as JSON.
#[derive(Debug, Serialize)]
pub struct SessionSummary<'a> {
    pub profile: &'a str,
    pub rows: usize,
    pub parse_errors: usize,
    pub outliers_dropped: usize,
    pub metrics: &'a DashboardMetrics,
}

#[derive(Debug, Clone)]
pub struct ReportSession {
    profile: ReportProfile,
    table: CleanTable,
    load: LoadReport,
    normalized: NormalizeReport,
    resolution: Resolution,
    dashboard: DashboardMetrics,
    series: Vec<SeriesOutcome>,
}

impl ReportSession {
    pub fn from_raw(raw: RawTable, load: LoadReport, profile: ReportProfile) -> Self {
        let (mut table, normalized) = normalize(&raw, &profile);
        let resolution = resolve_latest_status(&mut table, profile.status_source);
        let dashboard = compute_dashboard(&table, &profile);
        let series = compute_catalog(&table, &profile);
        info!(
            profile = %profile.name,
            rows = table.records.len(),
            series = series.len(),
            ?resolution,
            "session ready"
        );
        ReportSession {
            profile,
            table,
            load,
            normalized,
            resolution,
            dashboard,
            series,
        }
    }

    pub fn load_path(path: impl AsRef<Path>, profile: ReportProfile) -> Result<Self> {
        let (raw, load) = loader::load_path(path)?;
        Ok(Self::from_raw(raw, load, profile))
    }

    pub fn load_bytes(bytes: &[u8], format: InputFormat, profile: ReportProfile) -> Result<Self> {
        let (raw, load) = loader::load_bytes(bytes, format)?;
        Ok(Self::from_raw(raw, load, profile))
    }

    pub fn profile(&self) -> &ReportProfile {
        &self.profile
    }

    pub fn table(&self) -> &CleanTable {
        &self.table
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load
    }

    pub fn normalize_report(&self) -> &NormalizeReport {
        &self.normalized
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn dashboard(&self) -> &DashboardMetrics {
        &self.dashboard
    }

    pub fn series(&self) -> &[SeriesOutcome] {
        &self.series
    }

    pub fn summary(&self) -> SessionSummary<'_> {
        SessionSummary {
            profile: &self.profile.name,
            rows: self.table.records.len(),
            parse_errors: self.load.parse_errors,
            outliers_dropped: self.normalized.outliers_dropped,
            metrics: &self.dashboard,
        }
    }

    /// The dashboard option followed by every catalog series name.
    pub fn options(&self) -> Vec<String> {
        std::iter::once(DASHBOARD_OPTION.to_string())
            .chain(self.series.iter().map(|s| s.name().to_string()))
            .collect()
    }

    fn option_named(&self, name: &str) -> Option<OutputOption> {
        if name == DASHBOARD_OPTION {
            return Some(OutputOption::Dashboard);
        }
        self.series
            .iter()
            .position(|s| s.name() == name)
            .map(OutputOption::Series)
    }

    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Selection> {
        let mut picked = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            let option = self
                .option_named(name)
                .ok_or_else(|| ReportError::UnknownOption(name.to_string()))?;
            if !picked.contains(&option) {
                picked.push(option);
            }
        }
        Ok(Selection(picked))
    }

    fn series_at(&self, idx: usize) -> Result<&SeriesOutcome> {
        self.series
            .get(idx)
            .ok_or_else(|| ReportError::UnknownOption(format!("series #{}", idx + 1)))
    }

    /// One `(label, preview)` pair per selected option, in selection order.
    /// Only a selection built against another session can fail here.
    pub fn render(&self, selection: &Selection) -> Result<Vec<(String, Preview)>> {
        selection
            .options()
            .iter()
            .map(|opt| match *opt {
                OutputOption::Dashboard => Ok((
                    DASHBOARD_OPTION.to_string(),
                    Preview::Table(self.dashboard.rows()),
                )),
                OutputOption::Series(idx) => {
                    let outcome = self.series_at(idx)?;
                    // A chart that fails to draw is reported like an empty one;
                    // the rest of the selection still renders.
                    let preview = match render_outcome(outcome, &self.profile.chart) {
                        Ok(ChartOutcome::Rendered(img)) => Preview::Chart(img),
                        Ok(ChartOutcome::NoData { notice, .. }) => Preview::NoData(notice),
                        Err(e) => {
                            warn!(series = %outcome.name(), error = %e, "chart not drawn");
                            Preview::NoData(format!("Chart could not be drawn: {}", e))
                        }
                    };
                    Ok((outcome.name().to_string(), preview))
                }
            })
            .collect()
    }

    /// Build a fresh deck. Series without data are left out and reported.
    pub fn export(&self, selection: &Selection) -> Result<ExportedDeck> {
        let mut images = Vec::new();
        let mut notices = Vec::new();
        for (label, preview) in self.render(selection)? {
            match preview {
                Preview::Table(_) => {}
                Preview::Chart(img) => images.push(img),
                Preview::NoData(notice) => {
                    warn!(series = %label, "excluded from export");
                    notices.push(format!("{}: {}", label, notice));
                }
            }
        }

        let mut items = Vec::new();
        if selection.includes_dashboard() {
            items.push(ExportItem::Dashboard {
                metrics: &self.dashboard,
                delay_rule: self.profile.delay_rule,
            });
        }
        items.extend(images.iter().map(ExportItem::Chart));

        let titles = slide_titles(&items, &self.profile.deck);
        let bytes = build_deck(&items, &self.profile.deck)?;
        info!(slides = titles.len(), excluded = notices.len(), "deck exported");
        Ok(ExportedDeck {
            bytes,
            slide_titles: titles,
            notices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Purchase Order No.,Serial No.,Overall Status,Approver Action,Approver Name,Company Code Decription,No.of Days to Approve
PO-1,1,In Progress,Approved,Kim,ACME,3
PO-1,2,In Progress,Approved,Lee,ACME,\"1,204\"
PO-1,3,Approved,Approved,Kim,ACME,12
";

    fn session() -> ReportSession {
        ReportSession::load_bytes(CSV.as_bytes(), InputFormat::Csv, ReportProfile::general_report())
            .unwrap()
    }

    #[test]
    fn options_start_with_dashboard() {
        let options = session().options();
        assert_eq!(options.len(), 8);
        assert_eq!(options[0], DASHBOARD_OPTION);
        assert_eq!(options[1], "PO Avg Time by User: Approved");
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = session().select(&["Dashboard Summary", "Pie of Everything"]).unwrap_err();
        assert!(matches!(err, ReportError::UnknownOption(name) if name == "Pie of Everything"));
    }

    #[test]
    fn duplicate_selections_collapse() {
        let s = session();
        let sel = s
            .select(&["POs Cancelled/Deleted by Company", "Dashboard Summary", "POs Cancelled/Deleted by Company"])
            .unwrap();
        assert_eq!(sel.options(), &[OutputOption::Series(4), OutputOption::Dashboard]);
    }

    #[test]
    fn dashboard_preview_is_a_table() {
        let s = session();
        let sel = s.select(&[DASHBOARD_OPTION]).unwrap();
        let previews = s.render(&sel).unwrap();
        let (label, Preview::Table(rows)) = &previews[0] else {
            panic!("expected a table");
        };
        assert_eq!(label, DASHBOARD_OPTION);
        assert_eq!(rows[0].value, "1");
        assert_eq!(rows[1].value, "1");
    }

    #[test]
    fn empty_series_preview_is_a_notice() {
        let s = session();
        let sel = s.select(&["POs Cancelled/Deleted by Company"]).unwrap();
        let previews = s.render(&sel).unwrap();
        assert!(matches!(&previews[0].1, Preview::NoData(_)));
    }

    #[test]
    fn undrawable_chart_keeps_the_dashboard_slide() {
        let mut profile = ReportProfile::general_report();
        profile.chart.width_px = 0;
        let s = ReportSession::load_bytes(CSV.as_bytes(), InputFormat::Csv, profile).unwrap();
        let sel = s.select(&[DASHBOARD_OPTION, "PO Count by User: Approved"]).unwrap();

        let previews = s.render(&sel).unwrap();
        assert!(matches!(&previews[1].1, Preview::NoData(n) if n.starts_with("Chart could not be drawn")));

        let deck = s.export(&sel).unwrap();
        assert_eq!(deck.slide_titles, vec!["Purchase Order workflow output"]);
        assert_eq!(deck.notices.len(), 1);
        assert!(deck.notices[0].starts_with("PO Count by User: Approved"));
    }

    #[test]
    fn summary_reports_session_counts() {
        let s = session();
        let summary = s.summary();
        assert_eq!(summary.profile, "General Report");
        assert_eq!(summary.rows, 3);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["metrics"]["metrics"][0]["label"], "Total #POs");
    }
}
