//! JSON rendering and the persisted run report.
//!
//! The same document serves two purposes: `--output json` prints it to
//! stdout, and every non-dry run persists it into the review directory as
//! `dupsweep_report_<timestamp>.json` so a run can be audited later.
//!
//! # Output schema
//!
//! ```json
//! {
//!   "generated_at": "2026-08-30T12:00:00Z",
//!   "groups": [
//!     { "digest": "abc...", "size": 1024, "files": [ ... ] }
//!   ],
//!   "scan": { ... },
//!   "hashing": { ... },
//!   "execution": { "outcomes": [ ... ], ... }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duplicates::DuplicateGroup;
use crate::session::{report_path, SessionReport};

/// Errors from rendering or persisting a JSON report.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("report I/O failed for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One duplicate group in JSON form.
#[derive(Debug, Serialize)]
struct JsonGroup {
    /// BLAKE3 digest as a 64-character hex string
    digest: String,
    /// Member file size in bytes
    size: u64,
    /// Member paths, keeper first after resolution ordering
    files: Vec<String>,
}

impl JsonGroup {
    fn from_group(group: &DuplicateGroup) -> Self {
        Self {
            digest: group.digest_hex(),
            size: group.size,
            files: group
                .files
                .iter()
                .map(|f| f.path.display().to_string())
                .collect(),
        }
    }
}

/// The full JSON document for one run.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    generated_at: DateTime<Utc>,
    groups: Vec<JsonGroup>,
    scan: &'a crate::duplicates::SizeBucketStats,
    hashing: &'a crate::duplicates::GrouperStats,
    execution: &'a crate::actions::ExecutionReport,
}

impl<'a> JsonOutput<'a> {
    /// Build the document from a session report.
    #[must_use]
    pub fn new(report: &'a SessionReport) -> Self {
        Self {
            generated_at: Utc::now(),
            groups: report.groups.iter().map(JsonGroup::from_group).collect(),
            scan: &report.scan,
            hashing: &report.hashing,
            execution: &report.execution,
        }
    }

    /// Render as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, JsonOutputError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, JsonOutputError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

}

/// Persist the full session report into the review directory under a
/// timestamped name, returning the path written.
///
/// The persisted document is the raw [`SessionReport`] so it can be loaded
/// back by the `report` subcommand; the [`JsonOutput`] document is the
/// presentation form printed to stdout.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn persist_report(report: &SessionReport, review_dir: &Path) -> Result<PathBuf, JsonOutputError> {
    let path = report_path(review_dir);
    let body = serde_json::to_string_pretty(report)?;
    fs::write(&path, body).map_err(|e| JsonOutputError::Write {
        path: path.clone(),
        source: e,
    })?;
    log::info!("Run report written to {}", path.display());
    Ok(path)
}

/// Load a previously persisted session report.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_report(path: &Path) -> Result<SessionReport, JsonOutputError> {
    let body = fs::read_to_string(path).map_err(|e| JsonOutputError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&body)?)
}
