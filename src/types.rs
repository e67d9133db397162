use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tabled::Tabled;

pub const COL_PO_NUMBER: &str = "Purchase Order No.";
pub const COL_SERIAL_NO: &str = "Serial No.";
pub const COL_OVERALL_STATUS: &str = "Overall Status";
pub const COL_LATEST_STATUS: &str = "Latest Status";
pub const COL_APPROVER_ACTION: &str = "Approver Action";
pub const COL_APPROVER_NAME: &str = "Approver Name";
// Misspelled in the source system's export; must match it exactly.
pub const COL_COMPANY: &str = "Company Code Decription";
pub const COL_DAYS_TO_APPROVE: &str = "No.of Days to Approve";
pub const COL_CREATION_DATE: &str = "Creation Date";
pub const COL_RELEASED_DATE: &str = "Released Date";

/// One input row as text, keyed by the (trimmed) export header names.
///
/// Every field is optional: a column that is absent from the export, or a
/// blank cell, deserializes to `None`. Extra columns are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Purchase Order No.", default)]
    pub po_number: Option<String>,
    #[serde(rename = "Serial No.", default)]
    pub serial_no: Option<String>,
    #[serde(rename = "Overall Status", default)]
    pub overall_status: Option<String>,
    #[serde(rename = "Latest Status", default)]
    pub latest_status: Option<String>,
    #[serde(rename = "Approver Action", default)]
    pub approver_action: Option<String>,
    #[serde(rename = "Approver Name", default)]
    pub approver_name: Option<String>,
    #[serde(rename = "Company Code Decription", default)]
    pub company: Option<String>,
    #[serde(rename = "No.of Days to Approve", default)]
    pub days_to_approve: Option<String>,
    #[serde(rename = "Creation Date", default)]
    pub creation_date: Option<String>,
    #[serde(rename = "Released Date", default)]
    pub released_date: Option<String>,
}

/// Loaded input before any cleaning: the trimmed header list plus rows.
#[derive(Debug, Default, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

/// Logical fields the metrics depend on.
///
/// `Duration` can come from the days column or from the two date columns,
/// and `LatestStatus` can be derived, so these are not one-to-one with
/// input columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PoNumber,
    SerialNo,
    OverallStatus,
    LatestStatus,
    ApproverAction,
    ApproverName,
    Company,
    Duration,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::PoNumber => COL_PO_NUMBER,
            Field::SerialNo => COL_SERIAL_NO,
            Field::OverallStatus => COL_OVERALL_STATUS,
            Field::LatestStatus => COL_LATEST_STATUS,
            Field::ApproverAction => COL_APPROVER_ACTION,
            Field::ApproverName => COL_APPROVER_NAME,
            Field::Company => COL_COMPANY,
            Field::Duration => "Approval Duration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<Field>);

impl FieldSet {
    pub fn insert(&mut self, field: Field) {
        self.0.insert(field);
    }

    pub fn remove(&mut self, field: Field) {
        self.0.remove(&field);
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains(&field)
    }

    /// Fields from `required` that are not available, in the given order.
    pub fn missing(&self, required: &[Field]) -> Vec<Field> {
        required.iter().copied().filter(|f| !self.contains(*f)).collect()
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        FieldSet(iter.into_iter().collect())
    }
}

/// A cleaned row. Status values are trimmed and upper-cased.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PoRecord {
    pub po_number: Option<String>,
    pub serial_no: Option<i64>,
    pub overall_status: Option<String>,
    pub latest_status: Option<String>,
    pub approver_action: Option<String>,
    pub approver_name: Option<String>,
    pub company: Option<String>,
    pub duration_days: Option<f64>,
}

/// The session's single source of truth once normalization has run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanTable {
    pub records: Vec<PoRecord>,
    pub fields: FieldSet,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DashboardRow {
    #[serde(rename = "Activity")]
    #[tabled(rename = "Activity")]
    pub activity: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SeriesRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_requested_order() {
        let set: FieldSet = [Field::PoNumber, Field::Duration].into_iter().collect();
        assert_eq!(
            set.missing(&[Field::OverallStatus, Field::PoNumber, Field::ApproverAction]),
            vec![Field::OverallStatus, Field::ApproverAction]
        );
    }

    #[test]
    fn field_display_uses_export_header() {
        assert_eq!(Field::Company.to_string(), "Company Code Decription");
        assert_eq!(Field::PoNumber.to_string(), "Purchase Order No.");
    }
}
