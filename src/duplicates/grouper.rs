//! Content-hash grouping, the second phase of duplicate detection.
//!
//! # Overview
//!
//! Size buckets from [`super::groups::group_by_size`] are hashed in parallel
//! and re-partitioned by digest. Only files sharing a size bucket get hashed
//! at all, which is the key cost saving over hashing every scanned file.
//! Digest buckets with 2+ members become [`DuplicateGroup`]s.
//!
//! In paranoid mode each digest bucket is additionally confirmed with a
//! byte-for-byte compare; an equal-digest unequal-bytes pair (a hash
//! collision) is split apart and logged as a near-miss, never merged.
//!
//! Hash ordering is not guaranteed and does not affect the result: group
//! membership depends only on content, and members are sorted by path when
//! a group is finalized.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::progress::ProgressCallback;
use crate::scanner::{files_identical, Digest, FileRecord, HashError, Hasher};

use super::groups::DuplicateGroup;

/// Configuration for the hash-grouping phase.
#[derive(Clone, Default)]
pub struct GrouperOptions {
    /// Number of I/O threads for parallel hashing. Default 4 to prevent
    /// disk thrashing on spinning disks; 0 means the rayon default.
    pub io_threads: usize,
    /// Per-file hashing timeout; a timed-out file is excluded, not fatal.
    pub io_timeout: Option<Duration>,
    /// Confirm digest matches with a byte-for-byte compare.
    pub paranoid: bool,
    /// Optional cancellation flag for graceful termination.
    pub cancel_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for GrouperOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrouperOptions")
            .field("io_threads", &self.io_threads)
            .field("io_timeout", &self.io_timeout)
            .field("paranoid", &self.paranoid)
            .field("cancel_flag", &self.cancel_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl GrouperOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from the hash-grouping phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrouperStats {
    /// Files that entered the hash phase
    pub input_files: usize,
    /// Files successfully hashed
    pub hashed_files: usize,
    /// Files excluded due to hash failures (I/O errors, timeouts)
    pub failed_files: usize,
    /// Confirmed duplicate groups
    pub groups: usize,
    /// Total files across all confirmed groups
    pub duplicate_files: usize,
    /// Bytes reclaimable by keeping one copy per group
    pub reclaimable_bytes: u64,
    /// Digest collisions caught by the confirming byte compare
    pub collision_mismatches: usize,
    /// Whether the phase was interrupted by cancellation
    pub interrupted: bool,
    /// Hash failure messages, one per excluded file
    pub errors: Vec<String>,
}

/// Hash the members of each size bucket and assemble duplicate groups.
///
/// Hashing is parallelized across files with a rayon pool bounded by
/// `io_threads`. Files that fail to hash are excluded from grouping and
/// recorded in the stats; they never abort the batch. The returned groups
/// are sorted by the path of their first member for deterministic output.
#[must_use]
pub fn group_duplicates(
    size_buckets: HashMap<u64, Vec<FileRecord>>,
    hasher: Hasher,
    options: &GrouperOptions,
) -> (Vec<DuplicateGroup>, GrouperStats) {
    let mut stats = GrouperStats::default();

    let candidates: Vec<FileRecord> = size_buckets.into_values().flatten().collect();
    stats.input_files = candidates.len();

    if candidates.is_empty() {
        log::debug!("Hash phase: no candidate files");
        return (Vec::new(), stats);
    }

    if let Some(ref progress) = options.progress {
        progress.on_phase_start("hash", candidates.len());
    }
    log::info!("Hashing {} candidate files", candidates.len());

    let pool = build_pool(options.io_threads);
    let timeout = options.io_timeout;
    let opts = options.clone();

    let hash_results: Vec<(FileRecord, Option<Result<Digest, HashError>>)> = pool.install(|| {
        candidates
            .into_par_iter()
            .enumerate()
            .map(|(idx, record)| {
                if opts.is_cancelled() {
                    return (record, None);
                }

                if let Some(ref progress) = opts.progress {
                    progress.on_progress(idx + 1, record.path.to_string_lossy().as_ref());
                }

                let result = match timeout {
                    Some(t) => hasher.hash_file_with_timeout(&record.path, t),
                    None => hasher.hash_file(&record.path),
                };
                (record, Some(result))
            })
            .collect()
    });

    if options.is_cancelled() {
        stats.interrupted = true;
        log::info!("Hash phase interrupted by cancellation");
    }

    // Re-partition by (size, digest). Size is part of the key so two
    // different-size files can never share a group even on a digest clash.
    let mut digest_buckets: HashMap<(u64, Digest), Vec<FileRecord>> = HashMap::new();
    for (record, result) in hash_results {
        match result {
            Some(Ok(digest)) => {
                stats.hashed_files += 1;
                digest_buckets
                    .entry((record.size, digest))
                    .or_default()
                    .push(record.with_digest(digest));
            }
            Some(Err(e)) => {
                log::warn!("Excluding {} from grouping: {}", record.path.display(), e);
                stats.failed_files += 1;
                stats.errors.push(e.to_string());
            }
            None => {} // cancelled before hashing
        }
    }

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for ((size, digest), files) in digest_buckets {
        if files.len() < 2 {
            continue;
        }

        if options.paranoid {
            for subgroup in confirm_by_bytes(files, &mut stats) {
                if subgroup.len() >= 2 {
                    groups.push(DuplicateGroup::new(digest, size, subgroup));
                }
            }
        } else {
            groups.push(DuplicateGroup::new(digest, size, files));
        }
    }

    // Deterministic output order regardless of hash completion order.
    groups.sort_by(|a, b| a.files[0].path.cmp(&b.files[0].path));

    for group in &groups {
        stats.groups += 1;
        stats.duplicate_files += group.len();
        stats.reclaimable_bytes += group.wasted_space();
    }

    if let Some(ref progress) = options.progress {
        progress.on_phase_end("hash");
    }

    log::info!(
        "Hash phase complete: {} groups, {} duplicate files, {} bytes reclaimable",
        stats.groups,
        stats.duplicate_files,
        stats.reclaimable_bytes
    );

    (groups, stats)
}

/// Split a digest bucket into byte-identical subgroups.
///
/// Each file is compared against the representative of every existing
/// subgroup; in the overwhelmingly common case there is exactly one. A file
/// that matches no subgroup starts its own, and the mismatch is logged as a
/// collision near-miss.
fn confirm_by_bytes(files: Vec<FileRecord>, stats: &mut GrouperStats) -> Vec<Vec<FileRecord>> {
    let mut subgroups: Vec<Vec<FileRecord>> = Vec::new();

    'next_file: for file in files {
        for subgroup in &mut subgroups {
            match files_identical(&subgroup[0].path, &file.path) {
                Ok(true) => {
                    subgroup.push(file);
                    continue 'next_file;
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!(
                        "Byte compare failed, excluding {}: {}",
                        file.path.display(),
                        e
                    );
                    stats.failed_files += 1;
                    stats.errors.push(e.to_string());
                    continue 'next_file;
                }
            }
        }

        if !subgroups.is_empty() {
            stats.collision_mismatches += 1;
            log::warn!(
                "Digest collision near-miss: {} matches by hash but not by bytes",
                file.path.display()
            );
        }
        subgroups.push(vec![file]);
    }

    subgroups
}

/// Build a bounded rayon pool, falling back to the default on failure.
fn build_pool(io_threads: usize) -> rayon::ThreadPool {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if io_threads > 0 {
        builder = builder.num_threads(io_threads);
    }
    builder.build().unwrap_or_else(|_| {
        log::warn!(
            "Failed to create bounded thread pool, using default with {} threads",
            rayon::current_num_threads()
        );
        rayon::ThreadPoolBuilder::new()
            .build()
            .expect("default rayon pool")
    })
}
