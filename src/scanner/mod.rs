//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Content hashing with BLAKE3 (streaming)
//! - Exclusion rules (substring and gitignore-style glob patterns)
//! - Symlink cycle detection
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::scanner::{ScanOptions, Scanner};
//! use std::path::PathBuf;
//!
//! let options = ScanOptions {
//!     max_files: Some(10_000),
//!     ..Default::default()
//! };
//!
//! let scanner = Scanner::new(vec![PathBuf::from("/home/user/Downloads")], options);
//! let mut scan = scanner.scan();
//! for record in &mut scan {
//!     match record {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! println!("truncated: {}", scan.truncated());
//! ```

pub mod hasher;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

// Re-export main types
pub use hasher::{digest_to_hex, files_identical, Digest, HashError, Hasher, CHUNK_SIZE};
pub use walker::{ScanIter, Scanner};

/// Immutable snapshot of one filesystem entry at scan time.
///
/// Created by the [`Scanner`]; the digest is filled lazily by the duplicate
/// grouper and never mutated afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileRecord {
    /// Absolute, normalized path to the file
    pub path: PathBuf,
    /// File size in bytes at scan time
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Content digest, computed lazily during grouping
    pub digest: Option<Digest>,
}

impl FileRecord {
    /// Create a new record with no digest yet.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            digest: None,
        }
    }

    /// Finalize this record with its content digest.
    #[must_use]
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }
}

/// Directory names skipped by default, matched case-insensitively as
/// path-component substrings. Version-control metadata, caches, and
/// OS/system directories.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".svn",
    "__pycache__",
    "node_modules",
    ".vscode",
    "appdata",
    "system32",
    "windows",
];

/// Configuration for directory scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Case-insensitive substring patterns matched against directory names.
    pub exclude_substrings: Vec<String>,

    /// Gitignore-style glob patterns, applied in addition to substrings.
    pub exclude_globs: Vec<String>,

    /// Follow symbolic links during traversal. Cycles are detected via
    /// canonical-path tracking and pruned rather than followed infinitely.
    pub follow_symlinks: bool,

    /// Stop after yielding this many records, setting the truncation flag.
    pub max_files: Option<usize>,

    /// Minimum file size to include (in bytes). Defaults to 1, skipping
    /// empty files, which are trivially identical to each other.
    pub min_size: u64,

    /// Regex filters applied to file names (include: at least one must
    /// match; exclude: none may match).
    pub regex_include: Vec<regex::Regex>,
    /// See [`ScanOptions::regex_include`].
    pub regex_exclude: Vec<regex::Regex>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude_substrings: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_files: None,
            min_size: 1,
            regex_include: Vec::new(),
            regex_exclude: Vec::new(),
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
