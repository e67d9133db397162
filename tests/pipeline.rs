use po_report::config::ReportProfile;
use po_report::loader::InputFormat;
use po_report::reports::MetricKind;
use po_report::status::Resolution;
use po_report::{Preview, ReportError, ReportSession, DASHBOARD_OPTION};
use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

const GENERAL_HEADERS: [&str; 7] = [
    "Purchase Order No.",
    "Serial No.",
    "Overall Status",
    "Approver Action",
    "Approver Name",
    "Company Code Decription",
    "No.of Days to Approve",
];

const GENERAL_CSV: &str = "\
Purchase Order No.,Serial No.,Overall Status,Approver Action,Approver Name,Company Code Decription,No.of Days to Approve
PO-1,1,In Progress,Approved,Kim,ACME,3
PO-1,2,In Progress,Approved,Lee,ACME,12
PO-1,3,Approved,Approved,Kim,ACME,\"1,204\"
PO-2,1,In Progress,Pending,Lee,Globex,
PO-3,1,Cancelled,Rejected,Kim,Globex,2
";

fn general_session() -> ReportSession {
    ReportSession::load_bytes(
        GENERAL_CSV.as_bytes(),
        InputFormat::Csv,
        ReportProfile::general_report(),
    )
    .unwrap()
}

fn write_workbook(path: &Path, headers: &[&str], rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, h) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *h).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            let (r, col) = (r as u32 + 1, col as u16);
            match cell.parse::<f64>() {
                Ok(n) => sheet.write_number(r, col, n).unwrap(),
                Err(_) => sheet.write_string(r, col, *cell).unwrap(),
            };
        }
    }
    workbook.save(path).unwrap();
}

fn slides(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = Vec::new();
    for i in 1.. {
        let Ok(mut file) = archive.by_name(&format!("ppt/slides/slide{}.xml", i)) else {
            break;
        };
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        out.push(xml);
    }
    out
}

#[test]
fn workbook_po_resolves_to_highest_serial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("PO_Work_Report.xlsx");
    write_workbook(
        &path,
        &GENERAL_HEADERS,
        &[
            vec!["PO-9", "1", "In Progress", "Approved", "Kim", "ACME", "4"],
            vec!["PO-9", "2", "In Progress", "Approved", "Lee", "ACME", "6"],
            vec!["PO-9", "3", "Approved", "Approved", "Kim", "ACME", "2"],
        ],
    );

    let session = ReportSession::load_path(&path, ReportProfile::general_report()).unwrap();
    assert_eq!(session.load_report().total_rows, 3);
    assert_eq!(session.resolution(), &Resolution::Derived { pos: 1 });
    assert!(session
        .table()
        .records
        .iter()
        .all(|r| r.latest_status.as_deref() == Some("APPROVED")));
    let dashboard = session.dashboard();
    assert_eq!(dashboard.count(MetricKind::TotalPos), Some(1));
    assert_eq!(dashboard.count(MetricKind::TotalApproved), Some(1));
    assert_eq!(dashboard.display(MetricKind::AverageApprovalDays), "4.00");
}

#[test]
fn dashboard_figures_from_csv_export() {
    let session = general_session();
    let d = session.dashboard();
    assert_eq!(d.count(MetricKind::TotalPos), Some(3));
    assert_eq!(d.count(MetricKind::TotalApproved), Some(1));
    assert_eq!(d.count(MetricKind::TotalInProgress), Some(2));
    assert_eq!(d.count(MetricKind::TotalCancelledDeleted), Some(1));
    // 12 days on PO-1 sits inside (10, 20].
    assert_eq!(d.count(MetricKind::DelayedApprovals), Some(1));
    assert_eq!(d.display(MetricKind::DelayedPct), "100.00%");
    assert_eq!(d.display(MetricKind::WaitingPct), "66.67%");
}

#[test]
fn export_keeps_dashboard_then_selection_order() {
    let session = general_session();
    let selection = session
        .select(&[
            "PO Count by User: Approved",
            DASHBOARD_OPTION,
            "PO Avg Time by User: Approved",
        ])
        .unwrap();
    let deck = session.export(&selection).unwrap();
    assert_eq!(
        deck.slide_titles,
        vec![
            "Purchase Order workflow output",
            "PO Count by User: Approved",
            "PO Avg Time by User: Approved",
        ]
    );
    assert!(deck.notices.is_empty());

    let xml = slides(&deck.bytes);
    assert_eq!(xml.len(), 3);
    assert!(xml[0].contains("<a:tbl>"));
    assert!(xml[1].contains("PO Count by User: Approved"));
    assert!(xml[2].contains("PO Avg Time by User: Approved"));
}

#[test]
fn export_without_dashboard_has_no_table_slide() {
    let session = general_session();
    let selection = session
        .select(&["PO Count by User: Approved", "PO Count by User: In Progress"])
        .unwrap();
    let deck = session.export(&selection).unwrap();
    let xml = slides(&deck.bytes);
    assert_eq!(xml.len(), 2);
    assert!(xml.iter().all(|s| !s.contains("<a:tbl>")));
}

#[test]
fn series_without_data_are_left_out_of_the_deck() {
    let csv = "\
Purchase Order No.,Serial No.,Overall Status,Approver Action,Approver Name,Company Code Decription,No.of Days to Approve
PO-1,1,Approved,Approved,Kim,ACME,3
";
    let session =
        ReportSession::load_bytes(csv.as_bytes(), InputFormat::Csv, ReportProfile::general_report())
            .unwrap();
    let selection = session
        .select(&[DASHBOARD_OPTION, "POs Cancelled/Deleted by Company"])
        .unwrap();

    let previews = session.render(&selection).unwrap();
    assert!(matches!(&previews[1].1, Preview::NoData(n) if n == "No data available for this chart."));

    let deck = session.export(&selection).unwrap();
    assert_eq!(deck.slide_titles, vec!["Purchase Order workflow output"]);
    assert_eq!(deck.notices.len(), 1);
    assert!(deck.notices[0].starts_with("POs Cancelled/Deleted by Company"));
}

#[test]
fn unknown_selection_is_an_error() {
    let session = general_session();
    let err = session.select(&["Total Spend by Vendor"]).unwrap_err();
    assert!(matches!(err, ReportError::UnknownOption(_)));
}

#[test]
fn missing_columns_degrade_to_skipped_metrics() {
    let csv = "\
Purchase Order No.,Overall Status
PO-1,In Progress
PO-2,Approved
";
    let session =
        ReportSession::load_bytes(csv.as_bytes(), InputFormat::Csv, ReportProfile::general_report())
            .unwrap();
    assert!(matches!(session.resolution(), Resolution::Skipped { .. }));
    let d = session.dashboard();
    assert_eq!(d.count(MetricKind::TotalPos), Some(2));
    assert_eq!(d.count(MetricKind::TotalInProgress), Some(1));
    assert_eq!(d.count(MetricKind::TotalApproved), None);
    assert!(d.display(MetricKind::TotalApproved).starts_with("n/a (missing"));
    assert_eq!(d.display(MetricKind::WaitingPct), "50.00%");
}

#[test]
fn work_report_uses_latest_status_column() {
    let csv = "\
Purchase Order No.,Overall Status,Latest Status,Approver Action,No.of Days to Approve
PO-1,In Progress,approved,Approved,15
PO-2,In Progress,In Progress,Pending,
";
    let session =
        ReportSession::load_bytes(csv.as_bytes(), InputFormat::Csv, ReportProfile::work_report())
            .unwrap();
    assert!(session.options() == vec![DASHBOARD_OPTION.to_string()]);
    let d = session.dashboard();
    assert_eq!(d.count(MetricKind::TotalApproved), Some(1));
    assert_eq!(d.count(MetricKind::DelayedApprovals), Some(1));
    assert_eq!(d.display(MetricKind::AverageApprovalDays), "15.00");
}

#[test]
fn release_report_derives_durations_and_drops_outliers() {
    let csv = "\
Purchase Order No.,Overall Status,Approver Name,Company Code Decription,Creation Date,Released Date
PO-1,Approved,Kim,ACME,2024-01-01,2024-01-31
PO-2,Approved,Lee,ACME,01/01/2024,01/06/2024
PO-3,Approved,Lee,ACME,2020-01-01,2024-01-01
PO-4,In Progress,Kim,ACME,2024-02-01,
";
    let session =
        ReportSession::load_bytes(csv.as_bytes(), InputFormat::Csv, ReportProfile::release_report())
            .unwrap();
    assert_eq!(session.normalize_report().outliers_dropped, 1);
    let d = session.dashboard();
    assert_eq!(d.count(MetricKind::TotalPos), Some(3));
    assert_eq!(d.count(MetricKind::TotalApproved), Some(2));
    // 30 days counts as delayed under the open "> 10" rule.
    assert_eq!(d.count(MetricKind::DelayedApprovals), Some(1));
    assert_eq!(d.display(MetricKind::AverageApprovalDays), "17.50");
}

#[test]
fn unsupported_extension_is_rejected() {
    let err = ReportSession::load_path("report.pdf", ReportProfile::default()).unwrap_err();
    assert!(matches!(err, ReportError::UnsupportedFormat(_)));
}

#[test]
fn latin1_approver_name_still_counts_its_po() {
    let mut csv = b"Purchase Order No.,Serial No.,Overall Status,Approver Action,Approver Name,No.of Days to Approve\n\
PO-1,1,Approved,Approved,Kim,4\n\
PO-2,1,Approved,Approved,M"
        .to_vec();
    csv.extend_from_slice(b"\xE9ller,6\n");
    let session =
        ReportSession::load_bytes(&csv, InputFormat::Csv, ReportProfile::general_report()).unwrap();
    assert_eq!(session.load_report().parse_errors, 0);
    let d = session.dashboard();
    assert_eq!(d.count(MetricKind::TotalPos), Some(2));
    assert_eq!(d.count(MetricKind::TotalApproved), Some(2));
}
