// Crate-wide error type.
//
// Only I/O-facing steps (reading the input, drawing, packaging the deck,
// parsing a profile) can fail. Metric computation never returns an error:
// missing inputs show up as skipped metrics instead.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook contains no sheets")]
    EmptyWorkbook,
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("unknown report option: {0}")]
    UnknownOption(String),
    #[error("chart drawing failed for '{title}': {message}")]
    Chart { title: String, message: String },
    #[error("png encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("deck packaging failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid report profile: {0}")]
    Config(#[from] toml::de::Error),
}
