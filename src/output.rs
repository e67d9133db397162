use crate::error::Result;
use crate::reports::{AggregateSeries, SeriesOutcome};
use crate::types::DashboardRow;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path.as_ref(), s)?;
    info!(path = %path.as_ref().display(), "json written");
    Ok(())
}

pub fn write_bytes(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    std::fs::write(path.as_ref(), bytes)?;
    info!(path = %path.as_ref().display(), bytes = bytes.len(), "file written");
    Ok(())
}

/// File name for a chart PNG: lower-case, non-alphanumerics collapsed to `_`.
pub fn chart_file_name(dir: impl AsRef<Path>, title: &str) -> PathBuf {
    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "chart" } else { stem };
    dir.as_ref().join(format!("{}.png", stem))
}

pub fn markdown_table<T: Tabled>(rows: &[T]) -> String
where
    T: Clone,
{
    Table::new(rows.to_vec()).with(Style::markdown()).to_string()
}

pub fn preview_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", markdown_table(&slice));
}

pub fn preview_dashboard(title: &str, rows: &[DashboardRow]) {
    println!("{}\n", title);
    preview_rows(rows, rows.len());
}

pub fn preview_series(series: &AggregateSeries, max_rows: usize) {
    println!("{}\n", series.name);
    let rows = series.rows();
    preview_rows(&rows, max_rows);
    if rows.len() > max_rows {
        println!("({} more groups not shown)\n", rows.len() - max_rows);
    }
}

pub fn preview_outcome(outcome: &SeriesOutcome, max_rows: usize) {
    match outcome {
        SeriesOutcome::Computed(series) => preview_series(series, max_rows),
        SeriesOutcome::Skipped { name, missing } => {
            let names: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
            println!("{}\n(skipped: missing {})\n", name, names.join(", "));
        }
    }
}
