use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::types::RunReport;

/// Log every failed position, then a one-line summary. No-op when nothing failed.
pub fn log_failure_report(report: &RunReport, verbose: bool) {
    if report.failures.is_empty() {
        return;
    }
    log::warn!(
        "{} of {} records failed and were left out of the output",
        report.failures.len(),
        report.total
    );
    if verbose {
        for (position, err) in &report.failures {
            eprintln!("  item {} failed: {} ({})", position, err.kind(), err);
        }
    }
}

/// Write the run report (including failures) to `path` as JSON.
pub fn write_failure_report(report: &RunReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("create failure report {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("write failure report {}", path.display()))?;
    Ok(())
}
