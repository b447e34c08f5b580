//! Duplicate groups and size-based bucketing.
//!
//! # Overview
//!
//! Size bucketing is the first phase of duplicate detection. It partitions
//! records by exact byte size, eliminating most non-duplicates without a
//! single content read, since files of different sizes cannot be duplicates.
//! Only buckets with 2+ members move on to hashing.
//!
//! # Example
//!
//! ```
//! use dupsweep::scanner::FileRecord;
//! use dupsweep::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let records = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()),
//! ];
//!
//! let (buckets, stats) = group_by_size(records);
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.candidate_files, 2);
//! assert_eq!(buckets.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scanner::{digest_to_hex, Digest, FileRecord};

/// A confirmed group of byte-identical files.
///
/// Invariant: all members share the same size and content digest (and, in
/// paranoid mode, have passed a byte-for-byte compare), and there are at
/// least two of them. Members are sorted by path so grouping is independent
/// of scan and hash order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// BLAKE3 content digest shared by every member
    pub digest: Digest,
    /// File size in bytes shared by every member
    pub size: u64,
    /// Member records, sorted by path
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a group, sorting members by path.
    #[must_use]
    pub fn new(digest: Digest, size: u64, mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            digest,
            size,
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (total minus the one to keep).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Bytes reclaimable by removing all copies but one.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Digest as a hexadecimal string.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        digest_to_hex(&self.digest)
    }

    /// Paths of all members.
    #[must_use]
    pub fn paths(&self) -> Vec<std::path::PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Statistics from the size-bucketing phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBucketStats {
    /// Total number of records processed
    pub total_files: usize,
    /// Files in buckets with 2+ members (still possible duplicates)
    pub candidate_files: usize,
    /// Files eliminated because their size is unique
    pub unique_sizes: usize,
    /// Number of buckets with 2+ members
    pub candidate_buckets: usize,
}

/// Partition records by exact size, keeping only buckets with 2+ members.
///
/// Cheap first phase: no content is read. Singleton buckets are discarded
/// because a unique size can never be a duplicate.
#[must_use]
pub fn group_by_size(records: Vec<FileRecord>) -> (HashMap<u64, Vec<FileRecord>>, SizeBucketStats) {
    let mut stats = SizeBucketStats {
        total_files: records.len(),
        ..Default::default()
    };

    let mut buckets: HashMap<u64, Vec<FileRecord>> = HashMap::new();
    for record in records {
        buckets.entry(record.size).or_default().push(record);
    }

    buckets.retain(|size, files| {
        if files.len() > 1 {
            stats.candidate_files += files.len();
            stats.candidate_buckets += 1;
            true
        } else {
            stats.unique_sizes += 1;
            log::trace!("Unique size {}: {}", size, files[0].path.display());
            false
        }
    });

    log::debug!(
        "Size bucketing: {} files, {} candidates in {} buckets",
        stats.total_files,
        stats.candidate_files,
        stats.candidate_buckets
    );

    (buckets, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord::new(PathBuf::from(path), size, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_group_by_size_eliminates_unique_sizes() {
        let records = vec![
            record("/a.txt", 100),
            record("/b.txt", 100),
            record("/c.txt", 200),
            record("/d.txt", 300),
        ];

        let (buckets, stats) = group_by_size(records);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&100].len(), 2);
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.candidate_files, 2);
        assert_eq!(stats.unique_sizes, 2);
        assert_eq!(stats.candidate_buckets, 1);
    }

    #[test]
    fn test_group_by_size_empty_input() {
        let (buckets, stats) = group_by_size(vec![]);
        assert!(buckets.is_empty());
        assert_eq!(stats.total_files, 0);
    }

    #[test]
    fn test_duplicate_group_members_sorted() {
        let group = DuplicateGroup::new(
            [0u8; 32],
            10,
            vec![record("/z.txt", 10), record("/a.txt", 10), record("/m.txt", 10)],
        );

        let paths: Vec<_> = group.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/a.txt"),
                PathBuf::from("/m.txt"),
                PathBuf::from("/z.txt")
            ]
        );
    }

    #[test]
    fn test_duplicate_group_wasted_space() {
        let group = DuplicateGroup::new(
            [0u8; 32],
            1024,
            vec![record("/a", 1024), record("/b", 1024), record("/c", 1024)],
        );

        assert_eq!(group.duplicate_count(), 2);
        assert_eq!(group.wasted_space(), 2048);
    }

    #[test]
    fn test_duplicate_group_digest_hex() {
        let group = DuplicateGroup::new([0u8; 32], 1, vec![record("/a", 1), record("/b", 1)]);
        assert_eq!(group.digest_hex().len(), 64);
    }
}
