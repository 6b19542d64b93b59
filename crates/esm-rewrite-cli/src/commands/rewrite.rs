use super::{input_path, read_source, runtime};
use esm_rewrite_core::diagnostics::millis;
use esm_rewrite_core::{
    stats, ImportTransform, NodeModulesResolver, RewriteConfig, TransformOutput,
};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// JSON report for one rewritten module.
#[derive(Debug, Serialize)]
struct RewriteReport<'a> {
    importer: &'a str,
    skipped: bool,
    changed: bool,
    code: &'a str,
    warnings: Vec<WarningReport>,
    resolve_ms: f64,
    total_ms: f64,
}

#[derive(Debug, Serialize)]
struct WarningReport {
    code: &'static str,
    message: String,
}

/// Run the rewrite command.
///
/// Prints the rewritten module to stdout, or a single JSON report when
/// `json` is true. Warnings are logged to stderr either way.
pub fn run(
    cwd: &Path,
    config: RewriteConfig,
    file: &Path,
    importer: Option<&str>,
    json: bool,
) -> Result<()> {
    let path = input_path(cwd, file);
    let source = read_source(&path)?;
    let importer = match importer {
        Some(importer) => importer.to_string(),
        None => dunce::canonicalize(&path)
            .into_diagnostic()?
            .to_string_lossy()
            .into_owned(),
    };

    let resolver = Arc::new(NodeModulesResolver::new(&config));
    let transform = ImportTransform::new(config, resolver).into_diagnostic()?;

    let output = if transform.should_skip(&importer) {
        tracing::debug!(importer = %importer, "importer is not rewritten");
        None
    } else {
        let rt = runtime()?;
        rt.block_on(transform.transform(&source, &importer))
    };

    let totals = stats();
    tracing::debug!(
        invocations = totals.invocations,
        rewritten = totals.rewritten,
        total_ms = millis(totals.total_time()),
        resolve_ms = millis(totals.resolve_time()),
        "rewrite stats"
    );

    if json {
        print_json(&importer, &source, output.as_ref())
    } else {
        let code = output.as_ref().map_or(source.as_str(), |out| &*out.code);
        let mut stdout = io::stdout().lock();
        stdout.write_all(code.as_bytes()).into_diagnostic()?;
        stdout.flush().into_diagnostic()
    }
}

fn print_json(importer: &str, source: &str, output: Option<&TransformOutput<'_>>) -> Result<()> {
    let report = match output {
        Some(out) => RewriteReport {
            importer,
            skipped: false,
            changed: out.is_changed(),
            code: &out.code,
            warnings: out
                .warnings
                .iter()
                .map(|w| WarningReport {
                    code: w.code(),
                    message: w.to_string(),
                })
                .collect(),
            resolve_ms: millis(out.resolve_time),
            total_ms: millis(out.total_time),
        },
        None => RewriteReport {
            importer,
            skipped: true,
            changed: false,
            code: source,
            warnings: Vec::new(),
            resolve_ms: 0.0,
            total_ms: 0.0,
        },
    };

    let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
