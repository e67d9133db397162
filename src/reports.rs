// Metrics engine: the dashboard metric set and the grouped series behind
// each chart. Everything is a pure function of the cleaned table.
//
// Each metric names the fields it needs. When one is unavailable the metric
// is reported as skipped rather than silently zero.
use crate::config::{Aggregate, ReportProfile, SeriesSpec, APPROVED, CANCELLED, DELETED};
use crate::types::{CleanTable, DashboardRow, Field, FieldSet, PoRecord, SeriesRow};
use crate::util::{format_number, format_plain, mean, percentage, round2};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TotalPos,
    TotalApproved,
    TotalInProgress,
    TotalCancelledDeleted,
    AverageApprovalDays,
    DelayedApprovals,
    DelayedPct,
    WaitingPct,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Count(usize),
    /// `None` when no approved row carries a duration.
    Days(Option<f64>),
    Percent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Computed { value: MetricValue },
    Skipped { missing: Vec<Field> },
}

impl MetricOutcome {
    pub fn count(&self) -> Option<usize> {
        match self {
            MetricOutcome::Computed { value: MetricValue::Count(n) } => Some(*n),
            _ => None,
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            MetricOutcome::Computed { value: MetricValue::Percent(p) } => Some(*p),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            MetricOutcome::Computed { value } => match value {
                MetricValue::Count(n) => n.to_string(),
                MetricValue::Days(Some(d)) => format!("{:.2}", d),
                MetricValue::Days(None) => "n/a".to_string(),
                MetricValue::Percent(p) => format!("{:.2}%", p),
            },
            MetricOutcome::Skipped { missing } => {
                let names: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
                format!("n/a (missing {})", names.join(", "))
            }
        }
    }

    fn missing(&self) -> &[Field] {
        match self {
            MetricOutcome::Skipped { missing } => missing,
            MetricOutcome::Computed { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetric {
    pub kind: MetricKind,
    pub label: String,
    pub outcome: MetricOutcome,
}

/// The fixed, ordered headline figures of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub metrics: Vec<DashboardMetric>,
}

impl DashboardMetrics {
    pub fn get(&self, kind: MetricKind) -> Option<&MetricOutcome> {
        self.metrics.iter().find(|m| m.kind == kind).map(|m| &m.outcome)
    }

    pub fn count(&self, kind: MetricKind) -> Option<usize> {
        self.get(kind).and_then(MetricOutcome::count)
    }

    pub fn percent(&self, kind: MetricKind) -> Option<f64> {
        self.get(kind).and_then(MetricOutcome::percent)
    }

    pub fn display(&self, kind: MetricKind) -> String {
        self.get(kind).map(MetricOutcome::display).unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<DashboardRow> {
        self.metrics
            .iter()
            .map(|m| DashboardRow {
                activity: m.label.clone(),
                value: m.outcome.display(),
            })
            .collect()
    }
}

fn distinct_pos<'a>(records: impl Iterator<Item = &'a PoRecord>) -> usize {
    records
        .filter_map(|r| r.po_number.as_deref())
        .collect::<HashSet<&str>>()
        .len()
}

fn guarded<F>(fields: &FieldSet, kind: MetricKind, required: &[Field], compute: F) -> MetricOutcome
where
    F: FnOnce() -> MetricValue,
{
    let missing = fields.missing(required);
    if missing.is_empty() {
        MetricOutcome::Computed { value: compute() }
    } else {
        warn!(metric = ?kind, ?missing, "metric skipped");
        MetricOutcome::Skipped { missing }
    }
}

/// `100 * part / whole` over two count metrics; skipped if either was.
fn ratio(part: &MetricOutcome, whole: &MetricOutcome) -> MetricOutcome {
    match (part.count(), whole.count()) {
        (Some(p), Some(w)) => MetricOutcome::Computed {
            value: MetricValue::Percent(percentage(p, w).min(100.0)),
        },
        _ => {
            let mut missing: Vec<Field> = Vec::new();
            for f in part.missing().iter().chain(whole.missing()) {
                if !missing.contains(f) {
                    missing.push(*f);
                }
            }
            MetricOutcome::Skipped { missing }
        }
    }
}

pub fn compute_dashboard(table: &CleanTable, profile: &ReportProfile) -> DashboardMetrics {
    use Field::*;
    let recs = &table.records;
    let fields = &table.fields;
    let basis = profile.approval_basis;
    let rule = profile.delay_rule;

    let total_pos = guarded(fields, MetricKind::TotalPos, &[PoNumber], || {
        MetricValue::Count(distinct_pos(recs.iter()))
    });
    let total_approved = guarded(fields, MetricKind::TotalApproved, &[PoNumber, LatestStatus], || {
        MetricValue::Count(distinct_pos(
            recs.iter().filter(|r| r.latest_status.as_deref() == Some(APPROVED)),
        ))
    });
    let in_progress = guarded(fields, MetricKind::TotalInProgress, &[PoNumber, OverallStatus], || {
        MetricValue::Count(distinct_pos(recs.iter().filter(|r| {
            r.overall_status.as_deref().map_or(false, |s| s.contains("PROGRESS"))
        })))
    });
    let cancelled = guarded(fields, MetricKind::TotalCancelledDeleted, &[PoNumber, OverallStatus], || {
        MetricValue::Count(distinct_pos(recs.iter().filter(|r| {
            matches!(r.overall_status.as_deref(), Some(CANCELLED) | Some(DELETED))
        })))
    });
    let average = guarded(fields, MetricKind::AverageApprovalDays, &[basis.field(), Duration], || {
        let days: Vec<f64> = recs
            .iter()
            .filter(|r| basis.is_approved(r))
            .filter_map(|r| r.duration_days)
            .collect();
        MetricValue::Days(mean(&days).map(round2))
    });
    let delayed = guarded(fields, MetricKind::DelayedApprovals, &[PoNumber, basis.field(), Duration], || {
        MetricValue::Count(distinct_pos(recs.iter().filter(|r| {
            basis.is_approved(r) && r.duration_days.map_or(false, |d| rule.is_delayed(d))
        })))
    });
    let delayed_pct = ratio(&delayed, &total_approved);
    let waiting_pct = ratio(&in_progress, &total_pos);

    let threshold = format_plain(rule.threshold());
    let metric = |kind, label: &str, outcome| DashboardMetric {
        kind,
        label: label.to_string(),
        outcome,
    };
    DashboardMetrics {
        metrics: vec![
            metric(MetricKind::TotalPos, "Total #POs", total_pos),
            metric(MetricKind::TotalApproved, "Total Approved POs", total_approved),
            metric(MetricKind::TotalInProgress, "Total POs In Progress", in_progress),
            metric(MetricKind::TotalCancelledDeleted, "Total Cancelled/Deleted POs", cancelled),
            metric(MetricKind::AverageApprovalDays, "Average Approval Time/Approver", average),
            metric(
                MetricKind::DelayedApprovals,
                &format!("Delayed Approvals > {} days", threshold),
                delayed,
            ),
            metric(MetricKind::DelayedPct, "% Delayed Approval 'Approved PO'", delayed_pct),
            metric(MetricKind::WaitingPct, "POs Waiting for Approval", waiting_pct),
        ],
    }
}

/// A grouped aggregate, keyed by approver or company.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSeries {
    pub name: String,
    pub aggregate: Aggregate,
    /// Group key order (ascending by key).
    pub points: Vec<(String, f64)>,
}

impl AggregateSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn format_value(&self, v: f64) -> String {
        match self.aggregate {
            Aggregate::Count => format_number(v, 0),
            Aggregate::MeanDuration => format_number(v, 2),
        }
    }

    pub fn rows(&self) -> Vec<SeriesRow> {
        self.points
            .iter()
            .map(|(group, v)| SeriesRow {
                group: group.clone(),
                value: self.format_value(*v),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesOutcome {
    Computed(AggregateSeries),
    Skipped { name: String, missing: Vec<Field> },
}

impl SeriesOutcome {
    pub fn name(&self) -> &str {
        match self {
            SeriesOutcome::Computed(s) => &s.name,
            SeriesOutcome::Skipped { name, .. } => name,
        }
    }
}

/// Rows without a group key are left out. Counts only tally rows with a PO
/// number, so a group can show 0. Means ignore missing durations, and a
/// group with no durations at all does not appear.
pub fn compute_series(table: &CleanTable, spec: &SeriesSpec) -> SeriesOutcome {
    let missing = table.fields.missing(&spec.required_fields());
    if !missing.is_empty() {
        warn!(series = %spec.name, ?missing, "series skipped");
        return SeriesOutcome::Skipped { name: spec.name.clone(), missing };
    }

    #[derive(Default)]
    struct Acc {
        count: usize,
        durations: Vec<f64>,
    }
    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for rec in table.records.iter().filter(|r| spec.filter.matches(r)) {
        let Some(key) = spec.group_by.key(rec) else {
            continue;
        };
        let acc = groups.entry(key).or_default();
        if rec.po_number.is_some() {
            acc.count += 1;
        }
        if let Some(d) = rec.duration_days {
            acc.durations.push(d);
        }
    }

    let points = groups
        .into_iter()
        .filter_map(|(key, acc)| {
            let value = match spec.aggregate {
                Aggregate::Count => Some(acc.count as f64),
                Aggregate::MeanDuration => mean(&acc.durations),
            }?;
            Some((key.to_string(), value))
        })
        .collect();
    SeriesOutcome::Computed(AggregateSeries {
        name: spec.name.clone(),
        aggregate: spec.aggregate,
        points,
    })
}

pub fn compute_catalog(table: &CleanTable, profile: &ReportProfile) -> Vec<SeriesOutcome> {
    profile
        .catalog
        .iter()
        .map(|spec| compute_series(table, spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayRule, GroupBy, StatusFilter};

    fn all_fields() -> FieldSet {
        [
            Field::PoNumber,
            Field::SerialNo,
            Field::OverallStatus,
            Field::LatestStatus,
            Field::ApproverAction,
            Field::ApproverName,
            Field::Company,
            Field::Duration,
        ]
        .into_iter()
        .collect()
    }

    fn rec(po: &str, overall: &str, latest: &str, action: &str, days: Option<f64>) -> PoRecord {
        PoRecord {
            po_number: Some(po.to_string()),
            serial_no: Some(1),
            overall_status: Some(overall.to_string()),
            latest_status: Some(latest.to_string()),
            approver_action: Some(action.to_string()),
            approver_name: Some(format!("approver-{}", po)),
            company: Some("ACME".to_string()),
            duration_days: days,
        }
    }

    fn approved_table(days: &[f64]) -> CleanTable {
        let records = days
            .iter()
            .enumerate()
            .map(|(i, d)| rec(&format!("PO-{}", i), "APPROVED", "APPROVED", "APPROVED", Some(*d)))
            .collect();
        CleanTable { records, fields: all_fields() }
    }

    #[test]
    fn bounded_delay_rule_counts_between_ten_and_twenty() {
        let table = approved_table(&[5.0, 12.0, 18.0, 25.0]);
        let m = compute_dashboard(&table, &ReportProfile::general_report());
        assert_eq!(m.count(MetricKind::DelayedApprovals), Some(2));
        assert_eq!(
            m.get(MetricKind::AverageApprovalDays),
            Some(&MetricOutcome::Computed { value: MetricValue::Days(Some(15.0)) })
        );
        assert_eq!(m.percent(MetricKind::DelayedPct), Some(50.0));
    }

    #[test]
    fn open_delay_rule_counts_everything_above_ten() {
        let table = approved_table(&[5.0, 12.0, 18.0, 25.0]);
        let profile = ReportProfile {
            delay_rule: DelayRule::Open { above: 10.0 },
            ..ReportProfile::general_report()
        };
        let m = compute_dashboard(&table, &profile);
        assert_eq!(m.count(MetricKind::DelayedApprovals), Some(3));
    }

    #[test]
    fn subset_counts_never_exceed_total() {
        let table = CleanTable {
            records: vec![
                rec("A", "IN PROGRESS", "IN PROGRESS", "APPROVED", Some(3.0)),
                rec("A", "IN PROGRESS", "IN PROGRESS", "PENDING", None),
                rec("B", "APPROVED", "APPROVED", "APPROVED", Some(14.0)),
                rec("C", "CANCELLED", "CANCELLED", "REJECTED", None),
                rec("D", "DELETED", "DELETED", "REJECTED", None),
                rec("E", "WORK IN PROGRESS", "WORK IN PROGRESS", "PENDING", None),
            ],
            fields: all_fields(),
        };
        let m = compute_dashboard(&table, &ReportProfile::general_report());
        let total = m.count(MetricKind::TotalPos).unwrap();
        assert_eq!(total, 5);
        assert_eq!(m.count(MetricKind::TotalApproved), Some(1));
        assert_eq!(m.count(MetricKind::TotalInProgress), Some(2));
        assert_eq!(m.count(MetricKind::TotalCancelledDeleted), Some(2));
        for kind in [MetricKind::TotalApproved, MetricKind::TotalInProgress, MetricKind::TotalCancelledDeleted] {
            assert!(m.count(kind).unwrap() <= total);
        }
        assert_eq!(m.percent(MetricKind::WaitingPct), Some(40.0));
        assert_eq!(m.display(MetricKind::AverageApprovalDays), "8.50");
    }

    #[test]
    fn percentages_are_zero_without_denominators() {
        let table = CleanTable { records: Vec::new(), fields: all_fields() };
        let m = compute_dashboard(&table, &ReportProfile::general_report());
        assert_eq!(m.percent(MetricKind::DelayedPct), Some(0.0));
        assert_eq!(m.percent(MetricKind::WaitingPct), Some(0.0));
        assert_eq!(m.display(MetricKind::AverageApprovalDays), "n/a");
    }

    #[test]
    fn delayed_share_is_capped_when_bases_disagree() {
        // Approved step on the action column, but the PO ended up rejected.
        let table = CleanTable {
            records: vec![rec("A", "REJECTED", "REJECTED", "APPROVED", Some(15.0))],
            fields: all_fields(),
        };
        let m = compute_dashboard(&table, &ReportProfile::general_report());
        assert_eq!(m.count(MetricKind::TotalApproved), Some(0));
        assert_eq!(m.percent(MetricKind::DelayedPct), Some(0.0));

        let table = CleanTable {
            records: vec![
                rec("A", "APPROVED", "APPROVED", "APPROVED", Some(15.0)),
                rec("B", "REJECTED", "REJECTED", "APPROVED", Some(15.0)),
            ],
            fields: all_fields(),
        };
        let m = compute_dashboard(&table, &ReportProfile::general_report());
        assert_eq!(m.percent(MetricKind::DelayedPct), Some(100.0));
    }

    #[test]
    fn missing_columns_skip_only_dependent_metrics() {
        let mut fields = all_fields();
        fields.remove(Field::ApproverAction);
        let table = CleanTable {
            records: vec![rec("A", "APPROVED", "APPROVED", "APPROVED", Some(4.0))],
            fields,
        };
        let m = compute_dashboard(&table, &ReportProfile::general_report());
        assert_eq!(m.count(MetricKind::TotalPos), Some(1));
        assert_eq!(
            m.get(MetricKind::AverageApprovalDays),
            Some(&MetricOutcome::Skipped { missing: vec![Field::ApproverAction] })
        );
        assert_eq!(
            m.get(MetricKind::DelayedPct),
            Some(&MetricOutcome::Skipped { missing: vec![Field::ApproverAction] })
        );
        assert_eq!(m.percent(MetricKind::WaitingPct), Some(0.0));
        assert_eq!(
            m.display(MetricKind::DelayedApprovals),
            "n/a (missing Approver Action)"
        );
    }

    #[test]
    fn dashboard_rows_keep_fixed_order() {
        let m = compute_dashboard(&approved_table(&[12.0]), &ReportProfile::general_report());
        let labels: Vec<String> = m.rows().into_iter().map(|r| r.activity).collect();
        assert_eq!(
            labels,
            vec![
                "Total #POs",
                "Total Approved POs",
                "Total POs In Progress",
                "Total Cancelled/Deleted POs",
                "Average Approval Time/Approver",
                "Delayed Approvals > 10 days",
                "% Delayed Approval 'Approved PO'",
                "POs Waiting for Approval",
            ]
        );
        assert_eq!(m.display(MetricKind::DelayedPct), "100.00%");
    }

    #[test]
    fn series_group_by_key_and_ignore_missing_durations() {
        let mut records = vec![
            rec("A", "IN PROGRESS", "APPROVED", "APPROVED", Some(4.0)),
            rec("B", "IN PROGRESS", "APPROVED", "APPROVED", Some(8.0)),
            rec("C", "IN PROGRESS", "APPROVED", "APPROVED", None),
        ];
        for r in &mut records {
            r.approver_name = Some("Kim".to_string());
        }
        records[2].approver_name = Some("Lee".to_string());
        let table = CleanTable { records, fields: all_fields() };

        let mean = SeriesSpec::new(
            "avg",
            StatusFilter::LatestIs("APPROVED".to_string()),
            GroupBy::ApproverName,
            Aggregate::MeanDuration,
        );
        let SeriesOutcome::Computed(series) = compute_series(&table, &mean) else {
            panic!("expected computed series");
        };
        assert_eq!(series.points, vec![("Kim".to_string(), 6.0)]);

        let count = SeriesSpec { aggregate: Aggregate::Count, ..mean };
        let SeriesOutcome::Computed(series) = compute_series(&table, &count) else {
            panic!("expected computed series");
        };
        assert_eq!(
            series.points,
            vec![("Kim".to_string(), 2.0), ("Lee".to_string(), 1.0)]
        );
    }

    #[test]
    fn count_series_keeps_groups_without_po_numbers_at_zero() {
        let mut orphan = rec("X", "CANCELLED", "CANCELLED", "REJECTED", None);
        orphan.po_number = None;
        orphan.company = Some("Initech".to_string());
        let table = CleanTable {
            records: vec![rec("A", "DELETED", "DELETED", "REJECTED", None), orphan],
            fields: all_fields(),
        };
        let spec = SeriesSpec::new(
            "cancelled",
            StatusFilter::OverallIn(vec![CANCELLED.to_string(), DELETED.to_string()]),
            GroupBy::Company,
            Aggregate::Count,
        );
        let SeriesOutcome::Computed(series) = compute_series(&table, &spec) else {
            panic!("expected computed series");
        };
        assert_eq!(
            series.points,
            vec![("ACME".to_string(), 1.0), ("Initech".to_string(), 0.0)]
        );
    }

    #[test]
    fn series_with_no_matching_rows_is_empty() {
        let table = approved_table(&[3.0]);
        let outcomes = compute_catalog(&table, &ReportProfile::general_report());
        let cancelled = outcomes
            .iter()
            .find(|o| o.name() == "POs Cancelled/Deleted by Company")
            .unwrap();
        match cancelled {
            SeriesOutcome::Computed(s) => assert!(s.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn series_missing_group_column_is_skipped() {
        let mut fields = all_fields();
        fields.remove(Field::Company);
        let table = CleanTable { records: Vec::new(), fields };
        let outcomes = compute_catalog(&table, &ReportProfile::general_report());
        assert_eq!(outcomes.len(), 7);
        assert!(matches!(
            &outcomes[4],
            SeriesOutcome::Skipped { missing, .. } if missing == &vec![Field::Company]
        ));
        assert!(matches!(&outcomes[0], SeriesOutcome::Computed(_)));
    }
}
