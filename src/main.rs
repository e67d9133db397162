// Interactive entry point.
//
// - Option [1] loads and cleans the export, printing diagnostics.
// - Option [2] picks outputs from the catalog, previews them and writes the
//   chart PNGs.
// - Option [3] builds the PowerPoint deck for the current selection plus a
//   JSON summary of the dashboard.
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use po_report::output;
use po_report::util::format_int;
use po_report::{Preview, ReportProfile, ReportSession, Selection};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

const PROFILE_FILE: &str = "po_report.toml";
const DEFAULT_INPUT: &str = "PO_Work_Report.xlsx";
const DECK_FILE: &str = "PO_Report.pptx";
const SUMMARY_FILE: &str = "po_dashboard.json";
const PREVIEW_ROWS: usize = 10;
const EXIT_CHOICE: &str = "4";

// Load once, then select and export as many times as needed in one run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        session: None,
        selection: Selection::default(),
    })
});

struct AppState {
    session: Option<ReportSession>,
    selection: Selection,
}

/// Print `label` and read one trimmed line; `None` once stdin is closed.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    read_trimmed_line(&mut io::stdin().lock())
}

fn read_trimmed_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn lock_state() -> std::sync::MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

fn load_profile() -> Result<ReportProfile> {
    if Path::new(PROFILE_FILE).exists() {
        let profile = ReportProfile::load(PROFILE_FILE)
            .with_context(|| format!("reading {}", PROFILE_FILE))?;
        println!("Using report profile '{}' from {}.\n", profile.name, PROFILE_FILE);
        Ok(profile)
    } else {
        Ok(ReportProfile::default())
    }
}

/// Option [1]: load and clean the export.
fn handle_load(profile: &ReportProfile) -> Result<()> {
    let input = prompt(&format!("File to load [{}]: ", DEFAULT_INPUT)).unwrap_or_default();
    let path = if input.is_empty() { DEFAULT_INPUT.to_string() } else { input };

    let session = ReportSession::load_path(&path, profile.clone())
        .with_context(|| format!("loading {}", path))?;

    let load = session.load_report();
    let norm = session.normalize_report();
    println!(
        "Processing dataset... ({} rows loaded, {} kept)",
        format_int(load.total_rows),
        format_int(norm.rows)
    );
    if load.parse_errors > 0 {
        println!("Note: {} rows skipped due to parse errors.", format_int(load.parse_errors));
    }
    if norm.outliers_dropped > 0 {
        println!(
            "Note: {} rows dropped with durations of {}+ days.",
            format_int(norm.outliers_dropped),
            profile.outlier_cutoff_days
        );
    }
    if norm.unparseable_durations > 0 {
        println!(
            "Info: {} rows have no readable duration.",
            format_int(norm.unparseable_durations)
        );
    }
    println!("Latest status: {:?}\n", session.resolution());

    let mut state = lock_state();
    state.session = Some(session);
    state.selection = Selection::default();
    Ok(())
}

/// Option [2]: pick outputs by number, preview them and save chart images.
fn handle_select() -> Result<()> {
    let mut state = lock_state();
    let Some(session) = state.session.as_ref() else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return Ok(());
    };

    let options = session.options();
    println!("Available outputs:");
    for (i, name) in options.iter().enumerate() {
        println!("[{}] {}", i + 1, name);
    }
    let input = prompt("Enter numbers separated by commas: ").unwrap_or_default();

    let mut names = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<usize>().ok().and_then(|n| options.get(n.wrapping_sub(1))) {
            Some(name) => names.push(name.clone()),
            None => {
                println!("Invalid choice: {}\n", part);
                return Ok(());
            }
        }
    }
    let selection = session.select(&names)?;
    if selection.is_empty() {
        println!("Nothing selected.\n");
        return Ok(());
    }

    println!();
    for (label, preview) in session.render(&selection)? {
        match preview {
            Preview::Table(rows) => output::preview_dashboard(&label, &rows),
            Preview::Chart(img) => {
                if let Some(outcome) = session.series().iter().find(|s| s.name() == label) {
                    output::preview_outcome(outcome, PREVIEW_ROWS);
                }
                let path = output::chart_file_name(".", &img.title);
                output::write_bytes(&path, &img.png)?;
                println!("(Chart saved to {})\n", path.display());
            }
            Preview::NoData(notice) => println!("{}\n{}\n", label, notice),
        }
    }
    state.selection = selection;
    Ok(())
}

/// Option [3]: build the deck for the current selection.
fn handle_export() -> Result<()> {
    let state = lock_state();
    let Some(session) = state.session.as_ref() else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return Ok(());
    };
    if state.selection.is_empty() {
        println!("Error: Nothing selected. Please select outputs first (option 2).\n");
        return Ok(());
    }

    let deck = session.export(&state.selection)?;
    for notice in &deck.notices {
        println!("Skipped: {}", notice);
    }
    output::write_bytes(DECK_FILE, &deck.bytes)?;
    output::write_json(SUMMARY_FILE, &session.summary())?;
    println!("Slides:");
    for (i, title) in deck.slide_titles.iter().enumerate() {
        println!("  {}. {}", i + 1, title);
    }
    println!("Deck saved to {} (summary in {})\n", DECK_FILE, SUMMARY_FILE);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .with_writer(io::stderr)
        .init();

    let profile = load_profile()?;
    loop {
        println!("PO Workflow Report ({})", profile.name);
        println!("[1] Load the file");
        println!("[2] Select outputs");
        println!("[3] Generate PowerPoint");
        println!("[4] Exit\n");
        // Closed stdin exits instead of looping on empty input.
        let choice = prompt("Enter choice: ").unwrap_or_else(|| EXIT_CHOICE.to_string());
        let result = match choice.as_str() {
            "1" => handle_load(&profile),
            "2" => handle_select(),
            "3" => handle_export(),
            EXIT_CHOICE => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-4.\n");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "action failed");
            eprintln!("Error: {:#}\n", e);
        }
    }
    Ok(())
}
