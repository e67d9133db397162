//! Purchase-order workflow reporting.
//!
//! A spreadsheet export of PO approval steps goes through
//! [`normalize`](normalize::normalize), [`status`] resolution and the
//! [`reports`] metrics engine; the results are previewed as tables or bar
//! charts and exported as a `.pptx` deck. [`pipeline::ReportSession`] ties
//! the stages together.
pub mod chart;
pub mod config;
pub mod deck;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod status;
pub mod types;
pub mod util;

pub use config::ReportProfile;
pub use error::{ReportError, Result};
pub use pipeline::{ExportedDeck, Preview, ReportSession, Selection, DASHBOARD_OPTION};
