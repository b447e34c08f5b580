//! Decision executor with transactional move semantics.
//!
//! # Overview
//!
//! The [`Executor`] consumes [`Decision`]s and performs the corresponding
//! filesystem actions. Each decision walks the state machine
//! `Pending → Verified → {Moved | Deleted | Skipped} | Failed`; terminal
//! states are final and individual failures never abort the batch.
//!
//! # Move semantics
//!
//! On the same volume a move is a single `rename`. Across volumes the file
//! is copied to a temporary name next to the destination, the copy's BLAKE3
//! digest is verified, the temporary is renamed into place, and only then is
//! the source removed. On any failure the temporary is deleted and the
//! source stays untouched, so the content always exists at the origin or the
//! destination, never at neither.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::ProgressCallback;
use crate::resolve::{Action, Decision};
use crate::scanner::{digest_to_hex, Digest, Hasher, CHUNK_SIZE};

/// Errors from executing a single decision.
#[derive(thiserror::Error, Debug)]
pub enum ExecuteError {
    /// Source file was not found (and the destination does not hold it).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Source changed size since the scan; touching it would be unsafe.
    #[error("file modified since scan: {path} ({scanned} -> {current} bytes)")]
    Modified {
        path: PathBuf,
        scanned: u64,
        current: u64,
    },

    /// Destination exists with different content; refusing to overwrite.
    #[error("destination already exists with different content: {0}")]
    DestinationOccupied(PathBuf),

    /// Cross-volume copy produced content that does not match the source.
    #[error("copy verification failed for {0}: digest mismatch")]
    CopyVerifyFailed(PathBuf),

    /// The operation did not finish within the configured timeout.
    #[error("timed out executing action for {0}")]
    Timeout(PathBuf),

    /// Moving to the system trash failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExecuteError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Per-decision state machine. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    /// Not yet looked at.
    Pending,
    /// Source verified; action not yet performed (dry-run stops here).
    Verified,
    /// File moved to its review target.
    Moved,
    /// File deleted (trash or permanent).
    Deleted,
    /// Nothing to do (keeper, or action already done on a previous run).
    Skipped,
    /// Action failed; source left untouched.
    Failed,
}

/// Outcome of one decision, reported per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// The action was performed.
    Succeeded,
    /// Nothing to perform: keeper, or the action was already done.
    SkippedAlreadyDone,
    /// The action failed; the reason is recorded, the batch continued.
    Failed(String),
    /// The run was cancelled before this decision was attempted.
    NotAttempted,
}

/// Result of one executed decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// Source path the decision applied to
    pub path: PathBuf,
    /// The action that was requested
    pub action: Action,
    /// Policy reason carried over from resolution
    pub reason: String,
    /// Final state in the decision state machine
    pub state: DecisionState,
    /// Final outcome
    pub outcome: Outcome,
}

/// Structured result of a whole run, suitable for persistence.
///
/// Scan-level fields are filled in by the session; the executor populates
/// timestamps and per-decision outcomes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When execution finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Files yielded by the scanner
    pub files_scanned: usize,
    /// Whether the scan hit its `max_files` cap
    pub scan_truncated: bool,
    /// Duplicate groups found
    pub groups_found: usize,
    /// Bytes reclaimable by keeping one copy per group
    pub bytes_reclaimable: u64,
    /// Whether this was a dry run (no filesystem mutation)
    pub dry_run: bool,
    /// Whether the run was cancelled partway
    pub cancelled: bool,
    /// One outcome per decision
    pub outcomes: Vec<DecisionOutcome>,
}

impl ExecutionReport {
    /// Count outcomes matching a predicate.
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    /// Number of decisions whose action was performed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Succeeded))
    }

    /// Number of decisions that were already done.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::SkippedAlreadyDone))
    }

    /// Number of failed decisions.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// Number of decisions skipped due to cancellation.
    #[must_use]
    pub fn not_attempted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::NotAttempted))
    }

    /// Whether any decision failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Configuration for the executor.
#[derive(Clone, Default)]
pub struct ExecutorOptions {
    /// Verify only; perform no filesystem mutation.
    pub dry_run: bool,
    /// Delete permanently instead of moving to the system trash.
    pub permanent_delete: bool,
    /// Per-file timeout for copy operations.
    pub io_timeout: Option<Duration>,
    /// Cooperative cancellation flag, checked between decisions.
    pub cancel_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ExecutorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorOptions")
            .field("dry_run", &self.dry_run)
            .field("permanent_delete", &self.permanent_delete)
            .field("io_timeout", &self.io_timeout)
            .field("cancel_flag", &self.cancel_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Executes decisions against the real filesystem.
#[derive(Debug, Default)]
pub struct Executor {
    options: ExecutorOptions,
    hasher: Hasher,
}

impl Executor {
    /// Create an executor with the given options.
    #[must_use]
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options,
            hasher: Hasher::new(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Execute a batch of decisions.
    ///
    /// Failures are per-decision and never abort the batch. Cancellation is
    /// checked between decisions; the remainder is reported `NotAttempted`
    /// and the run can be safely re-executed later thanks to idempotence.
    #[must_use]
    pub fn execute(&self, decisions: &[Decision]) -> ExecutionReport {
        let mut report = ExecutionReport {
            started_at: Some(Utc::now()),
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        if let Some(ref progress) = self.options.progress {
            progress.on_phase_start("execute", decisions.len());
        }

        for (idx, decision) in decisions.iter().enumerate() {
            if self.is_cancelled() {
                log::info!("Execution cancelled; {} decisions not attempted", decisions.len() - idx);
                report.cancelled = true;
                for remaining in &decisions[idx..] {
                    report.outcomes.push(DecisionOutcome {
                        path: remaining.record.path.clone(),
                        action: remaining.action.clone(),
                        reason: remaining.reason.clone(),
                        state: DecisionState::Pending,
                        outcome: Outcome::NotAttempted,
                    });
                }
                break;
            }

            if let Some(ref progress) = self.options.progress {
                progress.on_progress(idx + 1, decision.record.path.to_string_lossy().as_ref());
            }

            let (state, outcome) = self.execute_one(decision);
            if let Outcome::Failed(ref reason) = outcome {
                log::warn!("Action failed for {}: {}", decision.record.path.display(), reason);
            }
            report.outcomes.push(DecisionOutcome {
                path: decision.record.path.clone(),
                action: decision.action.clone(),
                reason: decision.reason.clone(),
                state,
                outcome,
            });
        }

        if let Some(ref progress) = self.options.progress {
            progress.on_phase_end("execute");
        }

        report.finished_at = Some(Utc::now());
        log::info!(
            "Execution complete: {} succeeded, {} skipped, {} failed, {} not attempted",
            report.succeeded(),
            report.skipped(),
            report.failed(),
            report.not_attempted()
        );
        report
    }

    /// Run one decision through the state machine.
    fn execute_one(&self, decision: &Decision) -> (DecisionState, Outcome) {
        match &decision.action {
            // Keeper: nothing to perform, never counted as an action.
            Action::Keep => (DecisionState::Skipped, Outcome::SkippedAlreadyDone),
            Action::MoveToReview(target) => self.execute_move(decision, target),
            Action::Delete => self.execute_delete(decision),
        }
    }

    fn execute_move(&self, decision: &Decision, target: &Path) -> (DecisionState, Outcome) {
        let source = &decision.record.path;

        // Idempotence first: a previous run may already have moved this file.
        match self.target_holds_expected(target, decision.record.digest) {
            Ok(true) => {
                if source.exists() {
                    // Same content at both ends; do not remove the source
                    // here, that is a judgement for a fresh resolution.
                    log::debug!(
                        "Destination already holds content, source still present: {}",
                        target.display()
                    );
                }
                return (DecisionState::Skipped, Outcome::SkippedAlreadyDone);
            }
            Ok(false) => {
                if target.exists() {
                    return (
                        DecisionState::Failed,
                        Outcome::Failed(
                            ExecuteError::DestinationOccupied(target.to_path_buf()).to_string(),
                        ),
                    );
                }
            }
            Err(e) => return (DecisionState::Failed, Outcome::Failed(e.to_string())),
        }

        if let Err(e) = verify_source(source, decision.record.size) {
            return (DecisionState::Failed, Outcome::Failed(e.to_string()));
        }

        if self.options.dry_run {
            log::info!(
                "[dry-run] would move {} -> {}",
                source.display(),
                target.display()
            );
            return (DecisionState::Verified, Outcome::Succeeded);
        }

        match self.move_file(source, target, decision.record.digest) {
            Ok(()) => {
                log::info!("Moved {} -> {}", source.display(), target.display());
                (DecisionState::Moved, Outcome::Succeeded)
            }
            Err(e) => (DecisionState::Failed, Outcome::Failed(e.to_string())),
        }
    }

    fn execute_delete(&self, decision: &Decision) -> (DecisionState, Outcome) {
        let source = &decision.record.path;

        if !source.exists() {
            // Already gone; re-running a completed report is a no-op.
            return (DecisionState::Skipped, Outcome::SkippedAlreadyDone);
        }

        if let Err(e) = verify_source(source, decision.record.size) {
            return (DecisionState::Failed, Outcome::Failed(e.to_string()));
        }

        if self.options.dry_run {
            log::info!("[dry-run] would delete {}", source.display());
            return (DecisionState::Verified, Outcome::Succeeded);
        }

        let result = if self.options.permanent_delete {
            fs::remove_file(source).map_err(|e| ExecuteError::from_io(source, e))
        } else {
            trash::delete(source).map_err(|e| ExecuteError::TrashFailed {
                path: source.to_path_buf(),
                message: e.to_string(),
            })
        };

        match result {
            Ok(()) => {
                log::info!(
                    "Deleted {} ({})",
                    source.display(),
                    if self.options.permanent_delete {
                        "permanent"
                    } else {
                        "trash"
                    }
                );
                (DecisionState::Deleted, Outcome::Succeeded)
            }
            Err(e) => (DecisionState::Failed, Outcome::Failed(e.to_string())),
        }
    }

    /// Whether the target already holds the expected content.
    fn target_holds_expected(
        &self,
        target: &Path,
        expected: Option<Digest>,
    ) -> Result<bool, ExecuteError> {
        if !target.exists() {
            return Ok(false);
        }
        let Some(expected) = expected else {
            return Ok(false);
        };
        let actual = self
            .hasher
            .hash_file(target)
            .map_err(|e| ExecuteError::Io {
                path: target.to_path_buf(),
                source: io::Error::other(e.to_string()),
            })?;
        Ok(actual == expected)
    }

    /// Move a file, atomically where possible.
    fn move_file(
        &self,
        source: &Path,
        target: &Path,
        expected: Option<Digest>,
    ) -> Result<(), ExecuteError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ExecuteError::from_io(parent, e))?;
        }

        match fs::rename(source, target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                log::debug!(
                    "Cross-volume move, falling back to copy-verify-remove: {}",
                    source.display()
                );
                self.copy_verify_remove(source, target, expected)
            }
            Err(e) => Err(ExecuteError::from_io(source, e)),
        }
    }

    /// Cross-volume move: copy to a temporary, verify, rename, then remove
    /// the source. The source is only removed after the verified copy is in
    /// place; any failure cleans up the temporary and leaves the source.
    fn copy_verify_remove(
        &self,
        source: &Path,
        target: &Path,
        expected: Option<Digest>,
    ) -> Result<(), ExecuteError> {
        let tmp = temp_sibling(target);

        let copy_result = self.copy_with_digest(source, &tmp);
        let copied_digest = match copy_result {
            Ok(d) => d,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };

        // Verify the bytes that landed on disk, not just the stream we read.
        let landed = self.hasher.hash_file(&tmp).map_err(|e| ExecuteError::Io {
            path: tmp.clone(),
            source: io::Error::other(e.to_string()),
        });
        let landed = match landed {
            Ok(d) => d,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };

        let expected = expected.unwrap_or(copied_digest);
        if landed != copied_digest || landed != expected {
            let _ = fs::remove_file(&tmp);
            log::error!(
                "Copy verification failed for {}: expected {}, got {}",
                target.display(),
                digest_to_hex(&expected),
                digest_to_hex(&landed)
            );
            return Err(ExecuteError::CopyVerifyFailed(target.to_path_buf()));
        }

        if let Err(e) = fs::rename(&tmp, target) {
            let _ = fs::remove_file(&tmp);
            return Err(ExecuteError::from_io(target, e));
        }

        fs::remove_file(source).map_err(|e| ExecuteError::from_io(source, e))
    }

    /// Chunked copy that hashes the stream and checks the configured timeout
    /// between chunks.
    fn copy_with_digest(&self, source: &Path, tmp: &Path) -> Result<Digest, ExecuteError> {
        let deadline = self.options.io_timeout.map(|t| Instant::now() + t);

        let mut reader =
            fs::File::open(source).map_err(|e| ExecuteError::from_io(source, e))?;
        let mut writer = fs::File::create(tmp).map_err(|e| ExecuteError::from_io(tmp, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            if let Some(deadline) = deadline {
                if Instant::now() > deadline {
                    return Err(ExecuteError::Timeout(source.to_path_buf()));
                }
            }

            let n = reader
                .read(&mut buf)
                .map_err(|e| ExecuteError::from_io(source, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            writer
                .write_all(&buf[..n])
                .map_err(|e| ExecuteError::from_io(tmp, e))?;
        }

        writer.sync_all().map_err(|e| ExecuteError::from_io(tmp, e))?;
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Verify the source still matches its scanned size (TOCTOU guard).
fn verify_source(source: &Path, scanned_size: u64) -> Result<(), ExecuteError> {
    let metadata = fs::metadata(source).map_err(|e| ExecuteError::from_io(source, e))?;

    if metadata.len() != scanned_size {
        log::warn!(
            "File modified since scan: {} ({} -> {} bytes)",
            source.display(),
            scanned_size,
            metadata.len()
        );
        return Err(ExecuteError::Modified {
            path: source.to_path_buf(),
            scanned: scanned_size,
            current: metadata.len(),
        });
    }
    Ok(())
}

/// Temporary sibling name next to the target (same volume by construction).
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "part".to_string());
    target.with_file_name(format!(".{}.part", name))
}
