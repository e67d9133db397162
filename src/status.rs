// Latest-status resolution.
//
// Multi-row exports carry one row per approval step; the current state of a
// PO is the overall status on its highest serial number. Exports that
// already hold an authoritative status column are passed through.
use crate::config::StatusSource;
use crate::types::{CleanTable, Field};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Latest status derived from serial numbers for this many POs.
    Derived { pos: usize },
    /// An existing column was used as-is.
    Column(Field),
    Skipped { missing: Vec<Field> },
}

pub fn resolve_latest_status(table: &mut CleanTable, source: StatusSource) -> Resolution {
    let resolution = match source {
        StatusSource::SerialNumber => derive_from_serial(table),
        StatusSource::LatestStatusColumn => {
            if table.fields.contains(Field::LatestStatus) {
                Resolution::Column(Field::LatestStatus)
            } else {
                Resolution::Skipped { missing: vec![Field::LatestStatus] }
            }
        }
        StatusSource::OverallStatus => {
            if table.fields.contains(Field::OverallStatus) {
                for rec in &mut table.records {
                    rec.latest_status = rec.overall_status.clone();
                }
                table.fields.insert(Field::LatestStatus);
                Resolution::Column(Field::OverallStatus)
            } else {
                Resolution::Skipped { missing: vec![Field::OverallStatus] }
            }
        }
    };
    if let Resolution::Skipped { missing } = &resolution {
        warn!(?source, ?missing, "latest status unavailable");
        table.fields.remove(Field::LatestStatus);
    }
    resolution
}

/// Ties on the maximum serial number keep the first row encountered.
/// POs without any readable serial number get no latest status.
fn derive_from_serial(table: &mut CleanTable) -> Resolution {
    let missing = table
        .fields
        .missing(&[Field::PoNumber, Field::SerialNo, Field::OverallStatus]);
    if !missing.is_empty() {
        return Resolution::Skipped { missing };
    }

    let mut latest: HashMap<&str, (i64, usize)> = HashMap::new();
    for (idx, rec) in table.records.iter().enumerate() {
        let (Some(po), Some(serial)) = (rec.po_number.as_deref(), rec.serial_no) else {
            continue;
        };
        let replace = latest.get(po).map_or(true, |(best, _)| serial > *best);
        if replace {
            latest.insert(po, (serial, idx));
        }
    }

    let by_po: HashMap<String, Option<String>> = latest
        .into_iter()
        .map(|(po, (_, idx))| (po.to_string(), table.records[idx].overall_status.clone()))
        .collect();

    for rec in &mut table.records {
        rec.latest_status = rec
            .po_number
            .as_ref()
            .and_then(|po| by_po.get(po))
            .cloned()
            .flatten();
    }
    table.fields.insert(Field::LatestStatus);
    info!(pos = by_po.len(), "latest status derived from serial numbers");
    Resolution::Derived { pos: by_po.len() }
}
