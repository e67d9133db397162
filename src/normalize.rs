// Field normalization: raw text cells to typed, canonical values.
//
// Nothing here fails. A cell that cannot be read becomes `None`, and the
// only rows ever dropped are date-derived durations at or above the
// profile's outlier cutoff.
use crate::config::{DurationSource, ReportProfile};
use crate::types::*;
use crate::util::{clean_status, clean_text, days_diff, parse_date_safe, parse_f64_safe, parse_i64_safe};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows: usize,
    pub outliers_dropped: usize,
    pub unparseable_durations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationFrom {
    Days,
    Dates,
    Unavailable,
}

fn duration_from(raw: &RawTable, source: DurationSource) -> DurationFrom {
    let has_days = raw.has_column(COL_DAYS_TO_APPROVE);
    let has_dates = raw.has_column(COL_CREATION_DATE) && raw.has_column(COL_RELEASED_DATE);
    match source {
        DurationSource::DaysColumn if has_days => DurationFrom::Days,
        DurationSource::DateDifference if has_dates => DurationFrom::Dates,
        DurationSource::Auto if has_days => DurationFrom::Days,
        DurationSource::Auto if has_dates => DurationFrom::Dates,
        _ => DurationFrom::Unavailable,
    }
}

pub fn normalize(raw: &RawTable, profile: &ReportProfile) -> (CleanTable, NormalizeReport) {
    let mut fields = FieldSet::default();
    for (column, field) in [
        (COL_PO_NUMBER, Field::PoNumber),
        (COL_SERIAL_NO, Field::SerialNo),
        (COL_OVERALL_STATUS, Field::OverallStatus),
        (COL_LATEST_STATUS, Field::LatestStatus),
        (COL_APPROVER_ACTION, Field::ApproverAction),
        (COL_APPROVER_NAME, Field::ApproverName),
        (COL_COMPANY, Field::Company),
    ] {
        if raw.has_column(column) {
            fields.insert(field);
        }
    }

    let from = duration_from(raw, profile.duration_source);
    if from == DurationFrom::Unavailable {
        warn!(source = ?profile.duration_source, "no usable duration columns");
    } else {
        fields.insert(Field::Duration);
    }

    let mut report = NormalizeReport::default();
    let mut records = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        let (duration_days, had_input) = match from {
            DurationFrom::Days => (
                parse_f64_safe(row.days_to_approve.as_deref()),
                clean_text(row.days_to_approve.as_deref()).is_some(),
            ),
            DurationFrom::Dates => {
                let created = parse_date_safe(row.creation_date.as_deref());
                let released = parse_date_safe(row.released_date.as_deref());
                let had_input = row.creation_date.is_some() || row.released_date.is_some();
                match (created, released) {
                    (Some(c), Some(r)) => {
                        let days = days_diff(c, r);
                        if days >= profile.outlier_cutoff_days {
                            report.outliers_dropped += 1;
                            continue;
                        }
                        (Some(days), had_input)
                    }
                    _ => (None, had_input),
                }
            }
            DurationFrom::Unavailable => (None, false),
        };
        if duration_days.is_none() && had_input {
            report.unparseable_durations += 1;
        }

        records.push(PoRecord {
            po_number: clean_text(row.po_number.as_deref()),
            serial_no: parse_i64_safe(row.serial_no.as_deref()),
            overall_status: clean_status(row.overall_status.as_deref()),
            latest_status: clean_status(row.latest_status.as_deref()),
            approver_action: clean_status(row.approver_action.as_deref()),
            approver_name: clean_text(row.approver_name.as_deref()),
            company: clean_text(row.company.as_deref()),
            duration_days,
        });
    }

    report.rows = records.len();
    if report.outliers_dropped > 0 {
        warn!(dropped = report.outliers_dropped, cutoff = profile.outlier_cutoff_days, "duration outliers dropped");
    }
    debug!(rows = report.rows, unparseable = report.unparseable_durations, "normalized");
    (CleanTable { records, fields }, report)
}
