use super::{input_path, read_source, runtime};
use esm_rewrite_core::scan::{self, ImportOccurrence, OccurrenceKind};
use esm_rewrite_core::ScanError;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;

/// Exit code when the module cannot be scanned.
const EXIT_SCAN_FAILED: i32 = 1;

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    ok: bool,
    occurrences: Vec<OccurrenceReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Debug, Serialize)]
struct OccurrenceReport<'a> {
    kind: &'static str,
    start: usize,
    end: usize,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    offset: usize,
    message: String,
}

/// Run the scan command.
pub fn run(cwd: &Path, file: &Path, json: bool) -> Result<()> {
    let path = input_path(cwd, file);
    let source = read_source(&path)?;

    let rt = runtime()?;
    let result = rt.block_on(scan::scan(&source));

    match result {
        Ok(occurrences) => {
            let rows: Vec<_> = occurrences.iter().map(|o| row(o, &source)).collect();
            if json {
                print_json(&ScanReport {
                    ok: true,
                    occurrences: rows,
                    error: None,
                })?;
            } else {
                print_table(&rows);
            }
            Ok(())
        }
        Err(error) => {
            if json {
                print_json(&ScanReport {
                    ok: false,
                    occurrences: Vec::new(),
                    error: Some(ErrorReport {
                        offset: error.offset,
                        message: error.to_string(),
                    }),
                })?;
            } else {
                report_failure(&path, &error);
            }
            std::process::exit(EXIT_SCAN_FAILED);
        }
    }
}

fn row<'a>(occurrence: &ImportOccurrence, source: &'a str) -> OccurrenceReport<'a> {
    let kind = match occurrence.kind {
        OccurrenceKind::Static => "static",
        OccurrenceKind::Dynamic { .. } => "dynamic",
        OccurrenceKind::ImportMeta => "import.meta",
    };
    OccurrenceReport {
        kind,
        start: occurrence.start,
        end: occurrence.end,
        text: occurrence.text(source),
    }
}

fn print_json(report: &ScanReport<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn print_table(rows: &[OccurrenceReport<'_>]) {
    if rows.is_empty() {
        println!("No imports found.");
        return;
    }
    println!("{:<12} {:>8} {:>8}  TEXT", "KIND", "START", "END");
    for row in rows {
        println!(
            "{:<12} {:>8} {:>8}  {}",
            row.kind,
            row.start,
            row.end,
            row.text.replace('\n', " ")
        );
    }
}

fn report_failure(path: &Path, error: &ScanError) {
    eprintln!("error: failed to scan {}: {error}", path.display());
}
