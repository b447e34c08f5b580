//! End-to-end pipeline orchestration.
//!
//! A [`ScanSession`] runs the full scan → hash → resolve → execute pipeline
//! for one validated [`EngineConfig`] and produces a [`SessionReport`]:
//! the execution report plus the duplicate groups and phase statistics,
//! ready for rendering and persistence.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::actions::{ExecutionReport, Executor, ExecutorOptions};
use crate::config::{ConfigError, EngineConfig};
use crate::duplicates::{group_by_size, group_duplicates, DuplicateGroup, GrouperOptions, GrouperStats, SizeBucketStats};
use crate::progress::ProgressCallback;
use crate::resolve::Resolver;
use crate::scanner::{Hasher, Scanner};

/// Full result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Size-bucketing statistics from the scan phase
    pub scan: SizeBucketStats,
    /// Per-path scan errors that were skipped over (permissions, races)
    pub scan_errors: usize,
    /// Hash-phase statistics
    pub hashing: GrouperStats,
    /// Confirmed duplicate groups, sorted by first member path
    pub groups: Vec<DuplicateGroup>,
    /// Per-decision execution outcomes and timestamps
    pub execution: ExecutionReport,
}

impl SessionReport {
    /// Whether the run found any duplicates at all.
    #[must_use]
    pub fn found_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Orchestrates one run of the duplicate pipeline.
pub struct ScanSession {
    config: EngineConfig,
    cancel_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl ScanSession {
    /// Create a session, validating the configuration up front.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid; nothing on
    /// the filesystem has been touched beyond the review-directory probe.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel_flag: None,
            progress: None,
        })
    }

    /// Attach a cooperative cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the whole pipeline and return the combined report.
    #[must_use]
    pub fn run(&self) -> SessionReport {
        let (records, truncated, scan_errors) = self.scan_phase();
        let files_scanned = records.len();

        let (size_buckets, scan_stats) = group_by_size(records);
        log::info!(
            "Scan complete: {} files, {} size-collision candidates",
            scan_stats.total_files,
            scan_stats.candidate_files
        );

        let (groups, hash_stats) = group_duplicates(
            size_buckets,
            Hasher::new(),
            &GrouperOptions {
                io_threads: self.config.io_threads,
                io_timeout: self.config.io_timeout,
                paranoid: self.config.paranoid,
                cancel_flag: self.cancel_flag.clone(),
                progress: self.progress.clone(),
            },
        );

        let decisions = self.resolve_phase(&groups);

        let executor = Executor::new(ExecutorOptions {
            dry_run: self.config.dry_run,
            permanent_delete: self.config.permanent_delete,
            io_timeout: self.config.io_timeout,
            cancel_flag: self.cancel_flag.clone(),
            progress: self.progress.clone(),
        });
        let mut execution = executor.execute(&decisions);

        execution.files_scanned = files_scanned;
        execution.scan_truncated = truncated;
        execution.groups_found = groups.len();
        execution.bytes_reclaimable = hash_stats.reclaimable_bytes;
        execution.cancelled = execution.cancelled || hash_stats.interrupted;

        SessionReport {
            scan: scan_stats,
            scan_errors,
            hashing: hash_stats,
            groups,
            execution,
        }
    }

    /// Walk all roots and collect candidate records.
    ///
    /// Returns the records, the truncation flag, and the number of per-path
    /// errors skipped over. Anything under the review directory is filtered
    /// out, so re-runs never treat previously displaced copies as fresh
    /// input.
    fn scan_phase(&self) -> (Vec<crate::scanner::FileRecord>, bool, usize) {
        if let Some(ref progress) = self.progress {
            progress.on_phase_start("scan", 0);
        }

        let mut scanner = Scanner::new(self.config.roots.clone(), self.config.scan_options());
        if let Some(ref flag) = self.cancel_flag {
            scanner = scanner.with_cancel_flag(Arc::clone(flag));
        }

        let review_dir = self.config.review_dir.canonicalize().ok();
        let mut iter = scanner.scan();
        let mut records = Vec::new();
        let mut scan_errors = 0usize;
        for item in iter.by_ref() {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    // Per-path failures never abort the scan.
                    log::warn!("Scan error skipped: {e}");
                    scan_errors += 1;
                    continue;
                }
            };
            if let Some(ref review) = review_dir {
                if record.path.starts_with(review) {
                    continue;
                }
            }
            records.push(record);
        }
        let truncated = iter.truncated();
        if truncated {
            log::warn!(
                "Scan truncated at the configured cap of {} files; results are partial",
                self.config.max_files.unwrap_or(records.len())
            );
        }

        if let Some(ref progress) = self.progress {
            progress.on_phase_end("scan");
        }
        (records, truncated, scan_errors)
    }

    /// Apply the keep rule to every group.
    fn resolve_phase(&self, groups: &[DuplicateGroup]) -> Vec<crate::resolve::Decision> {
        let mut resolver = Resolver::new(
            self.config.keep_rule,
            self.config.review_dir.clone(),
            self.config.delete_duplicates,
        );
        let mut decisions = Vec::new();
        for group in groups {
            decisions.extend(resolver.resolve(group));
        }
        log::debug!(
            "Resolved {} groups into {} decisions",
            groups.len(),
            decisions.len()
        );
        decisions
    }
}

/// Compute the timestamped report path inside the review directory.
#[must_use]
pub fn report_path(review_dir: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    review_dir.join(format!("dupsweep_report_{stamp}.json"))
}
