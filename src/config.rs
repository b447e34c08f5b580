//! Engine configuration.
//!
//! The engine is configured through one explicit, immutable [`EngineConfig`]
//! built by the caller (CLI, scheduled job) and passed in at construction.
//! The core never reads environment variables or other ambient process
//! state.
//!
//! Validation is fatal-only and happens before any filesystem mutation: a
//! missing root or an unwritable review destination fails the whole run
//! with a clear diagnostic.

use std::path::PathBuf;
use std::time::Duration;

use crate::resolve::KeepRule;
use crate::scanner::{ScanOptions, DEFAULT_EXCLUDES};

/// Default per-file I/O timeout (seconds).
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 120;

/// Default number of hashing I/O threads.
pub const DEFAULT_IO_THREADS: usize = 4;

/// Name of the review folder created under the first root when no explicit
/// destination is configured.
pub const DEFAULT_REVIEW_DIR_NAME: &str = "review_duplicate";

/// Fatal configuration errors, raised before any filesystem mutation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No scan roots were supplied.
    #[error("no scan roots configured")]
    NoRoots,

    /// A scan root does not exist.
    #[error("scan root does not exist: {0}")]
    RootNotFound(PathBuf),

    /// A scan root is not a directory.
    #[error("scan root is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    /// The review destination cannot be created or written.
    #[error("review destination is not writable: {path}: {source}")]
    ReviewDirUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Permanent deletion requires deletion to be enabled at all.
    #[error("permanent deletion requires deletion to be enabled")]
    PermanentWithoutDelete,

    /// io_threads must be at least 1.
    #[error("io_threads must be at least 1")]
    NoIoThreads,
}

/// Immutable configuration for one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directories to scan
    pub roots: Vec<PathBuf>,
    /// Review destination for displaced duplicates
    pub review_dir: PathBuf,
    /// Case-insensitive substring excludes (directory names)
    pub exclude_substrings: Vec<String>,
    /// Gitignore-style glob excludes
    pub exclude_globs: Vec<String>,
    /// File-name regexes a file must match at least one of (empty: all pass)
    pub regex_include: Vec<regex::Regex>,
    /// File-name regexes that exclude a file on any match
    pub regex_exclude: Vec<regex::Regex>,
    /// Follow symbolic links (with cycle detection)
    pub follow_symlinks: bool,
    /// Scan cap; exceeding it sets the truncation flag
    pub max_files: Option<usize>,
    /// Minimum file size in bytes (default 1, skipping empty files)
    pub min_size: u64,
    /// Which duplicate to retain per group
    pub keep_rule: KeepRule,
    /// Delete duplicates instead of moving them to review (explicit opt-in)
    pub delete_duplicates: bool,
    /// Delete permanently instead of using the system trash
    pub permanent_delete: bool,
    /// Confirm digest matches with a byte-for-byte compare
    pub paranoid: bool,
    /// Bounded parallelism for hashing
    pub io_threads: usize,
    /// Per-file I/O timeout
    pub io_timeout: Option<Duration>,
    /// Verify-only mode; no filesystem mutation
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            review_dir: PathBuf::from(DEFAULT_REVIEW_DIR_NAME),
            exclude_substrings: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            exclude_globs: Vec::new(),
            regex_include: Vec::new(),
            regex_exclude: Vec::new(),
            follow_symlinks: false,
            max_files: None,
            min_size: 1,
            keep_rule: KeepRule::default(),
            delete_duplicates: false,
            permanent_delete: false,
            paranoid: false,
            io_threads: DEFAULT_IO_THREADS,
            io_timeout: Some(Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS)),
            dry_run: false,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration, failing before any mutation.
    ///
    /// Creates the review destination (unless deleting or dry-running) and
    /// probes it for writability; every root must exist and be a directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        if self.io_threads == 0 {
            return Err(ConfigError::NoIoThreads);
        }
        if self.permanent_delete && !self.delete_duplicates {
            return Err(ConfigError::PermanentWithoutDelete);
        }

        for root in &self.roots {
            if !root.exists() {
                return Err(ConfigError::RootNotFound(root.clone()));
            }
            if !root.is_dir() {
                return Err(ConfigError::RootNotADirectory(root.clone()));
            }
        }

        // The review directory is only needed when files will move there.
        if !self.delete_duplicates && !self.dry_run {
            self.probe_review_dir()?;
        }

        Ok(())
    }

    /// Create the review directory and check it accepts writes.
    fn probe_review_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.review_dir).map_err(|e| ConfigError::ReviewDirUnwritable {
            path: self.review_dir.clone(),
            source: e,
        })?;

        let probe = self.review_dir.join(".dupsweep_write_probe");
        std::fs::write(&probe, b"").map_err(|e| ConfigError::ReviewDirUnwritable {
            path: self.review_dir.clone(),
            source: e,
        })?;
        let _ = std::fs::remove_file(&probe);
        Ok(())
    }

    /// Derive scanner options from this configuration.
    ///
    /// The review directory itself is filtered out of the scan by canonical
    /// path prefix in the session, not here, so its name never over-matches
    /// unrelated directories.
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            exclude_substrings: self.exclude_substrings.clone(),
            exclude_globs: self.exclude_globs.clone(),
            follow_symlinks: self.follow_symlinks,
            max_files: self.max_files,
            min_size: self.min_size,
            regex_include: self.regex_include.clone(),
            regex_exclude: self.regex_exclude.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(root: &TempDir, review: &TempDir) -> EngineConfig {
        EngineConfig {
            roots: vec![root.path().to_path_buf()],
            review_dir: review.path().join("review"),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let root = TempDir::new().unwrap();
        let review = TempDir::new().unwrap();
        valid_config(&root, &review).validate().unwrap();
    }

    #[test]
    fn test_no_roots_rejected() {
        let config = EngineConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoRoots)));
    }

    #[test]
    fn test_missing_root_rejected() {
        let review = TempDir::new().unwrap();
        let config = EngineConfig {
            roots: vec![PathBuf::from("/nonexistent/root/xyz")],
            review_dir: review.path().join("review"),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::RootNotFound(_))));
    }

    #[test]
    fn test_file_root_rejected() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        let review = TempDir::new().unwrap();
        let config = EngineConfig {
            roots: vec![file],
            review_dir: review.path().join("review"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RootNotADirectory(_))
        ));
    }

    #[test]
    fn test_review_dir_created_by_validate() {
        let root = TempDir::new().unwrap();
        let review = TempDir::new().unwrap();
        let config = valid_config(&root, &review);

        config.validate().unwrap();
        assert!(config.review_dir.is_dir());
    }

    #[test]
    fn test_permanent_without_delete_rejected() {
        let root = TempDir::new().unwrap();
        let review = TempDir::new().unwrap();
        let config = EngineConfig {
            permanent_delete: true,
            ..valid_config(&root, &review)
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PermanentWithoutDelete)
        ));
    }

    #[test]
    fn test_zero_io_threads_rejected() {
        let root = TempDir::new().unwrap();
        let review = TempDir::new().unwrap();
        let config = EngineConfig {
            io_threads: 0,
            ..valid_config(&root, &review)
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoIoThreads)));
    }

    #[test]
    fn test_scan_options_carry_defaults() {
        let root = TempDir::new().unwrap();
        let review = TempDir::new().unwrap();
        let config = valid_config(&root, &review);

        let options = config.scan_options();
        assert!(options.exclude_substrings.contains(&".git".to_string()));
        assert_eq!(options.min_size, 1);
    }

    #[test]
    fn test_scan_options_carry_regex_filters() {
        let root = TempDir::new().unwrap();
        let review = TempDir::new().unwrap();
        let config = EngineConfig {
            regex_include: vec![regex::Regex::new(r"\.txt$").unwrap()],
            regex_exclude: vec![regex::Regex::new("^backup_").unwrap()],
            ..valid_config(&root, &review)
        };

        let options = config.scan_options();
        assert_eq!(options.regex_include.len(), 1);
        assert_eq!(options.regex_exclude.len(), 1);
    }
}
