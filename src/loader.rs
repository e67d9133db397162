// Input loading: CSV exports and spreadsheet workbooks, from disk or from an
// uploaded buffer. Both paths end in the same `RawTable` of text cells keyed
// by trimmed header names; no cleaning happens here.
use crate::error::{ReportError, Result};
use crate::types::{RawRow, RawTable};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Workbook,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(InputFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(InputFormat::Workbook),
            _ => Err(ReportError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub parse_errors: usize,
    pub empty_rows: usize,
}

pub fn load_path(path: impl AsRef<Path>) -> Result<(RawTable, LoadReport)> {
    let path = path.as_ref();
    let loaded = match InputFormat::from_path(path)? {
        InputFormat::Csv => {
            let rdr = csv_builder().from_path(path)?;
            read_csv(rdr)?
        }
        InputFormat::Workbook => {
            let mut workbook = open_workbook_auto(path)?;
            let range = first_sheet(&mut workbook)?;
            read_range(&range)
        }
    };
    info!(
        path = %path.display(),
        rows = loaded.1.total_rows,
        columns = loaded.0.headers.len(),
        "input loaded"
    );
    Ok(loaded)
}

/// Load an in-memory upload.
pub fn load_bytes(bytes: &[u8], format: InputFormat) -> Result<(RawTable, LoadReport)> {
    let loaded = match format {
        InputFormat::Csv => read_csv(csv_builder().from_reader(bytes))?,
        InputFormat::Workbook => {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
            let range = first_sheet(&mut workbook)?;
            read_range(&range)
        }
    };
    info!(rows = loaded.1.total_rows, columns = loaded.0.headers.len(), "upload loaded");
    Ok(loaded)
}

fn csv_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.flexible(true).trim(Trim::Headers);
    builder
}

fn read_csv<R: Read>(mut rdr: csv::Reader<R>) -> Result<(RawTable, LoadReport)> {
    let headers = rdr.headers()?.clone();
    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    let mut bytes = ByteRecord::new();
    loop {
        match rdr.read_byte_record(&mut bytes) {
            Ok(false) => break,
            Ok(true) => {}
            Err(e) => {
                report.total_rows += 1;
                report.parse_errors += 1;
                warn!(error = %e, "unreadable csv row skipped");
                continue;
            }
        }
        report.total_rows += 1;
        // Legacy exports may carry Latin-1 names; a bad byte costs the cell's
        // accent, not the row.
        let record: StringRecord = bytes
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        push_record(&record, &headers, &mut rows, &mut report);
    }
    let table = RawTable {
        headers: headers.iter().map(str::to_string).collect(),
        rows,
    };
    Ok((table, report))
}

fn first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> Result<Range<Data>> {
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReportError::EmptyWorkbook)??;
    Ok(range)
}

fn read_range(range: &Range<Data>) -> (RawTable, LoadReport) {
    let mut report = LoadReport::default();
    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return (RawTable::default(), report);
    };
    let headers: StringRecord = header_row
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in rows_iter {
        report.total_rows += 1;
        let record: StringRecord = row.iter().map(cell_to_string).collect();
        push_record(&record, &headers, &mut rows, &mut report);
    }
    let table = RawTable {
        headers: headers.iter().map(str::to_string).collect(),
        rows,
    };
    (table, report)
}

fn push_record(
    record: &StringRecord,
    headers: &StringRecord,
    rows: &mut Vec<RawRow>,
    report: &mut LoadReport,
) {
    if record.iter().all(|f| f.trim().is_empty()) {
        report.empty_rows += 1;
        return;
    }
    match record.deserialize::<RawRow>(Some(headers)) {
        Ok(row) => rows.push(row),
        Err(e) => {
            report.parse_errors += 1;
            debug!(error = %e, "row skipped");
        }
    }
}

/// Render a workbook cell the way it would appear in a CSV export.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
