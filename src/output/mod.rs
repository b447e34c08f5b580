//! Output rendering for session reports.
//!
//! Three renderings of a [`SessionReport`](crate::session::SessionReport):
//! - human-readable text summary for the terminal
//! - JSON for automation and for the persisted run report
//! - CSV, one row per decision, for spreadsheet import

pub mod csv;
pub mod json;

pub use csv::CsvOutput;
pub use json::{load_report, persist_report, JsonOutput};

use bytesize::ByteSize;

use crate::session::SessionReport;

/// Render a terminal summary of the run.
#[must_use]
pub fn render_summary(report: &SessionReport) -> String {
    let exec = &report.execution;
    let mut out = String::new();

    out.push_str(&format!(
        "Scanned {} files ({} candidates after size bucketing)\n",
        report.scan.total_files, report.scan.candidate_files
    ));
    if exec.scan_truncated {
        out.push_str("WARNING: scan hit the configured file cap; results are partial\n");
    }
    if report.scan_errors > 0 {
        out.push_str(&format!(
            "WARNING: {} paths could not be read and were skipped\n",
            report.scan_errors
        ));
    }
    out.push_str(&format!(
        "Found {} duplicate groups, {} reclaimable\n",
        exec.groups_found,
        ByteSize::b(exec.bytes_reclaimable)
    ));
    if exec.dry_run {
        out.push_str("Dry run: no files were changed\n");
    }
    out.push_str(&format!(
        "Actions: {} performed, {} already done, {} failed",
        exec.succeeded(),
        exec.skipped(),
        exec.failed()
    ));
    if exec.not_attempted() > 0 {
        out.push_str(&format!(", {} not attempted", exec.not_attempted()));
    }
    out.push('\n');
    if report.hashing.collision_mismatches > 0 {
        out.push_str(&format!(
            "Paranoid check split {} near-miss digest matches\n",
            report.hashing.collision_mismatches
        ));
    }
    if exec.cancelled {
        out.push_str("Run was interrupted; re-running will resume safely\n");
    }
    out
}
