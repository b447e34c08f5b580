//! Directory scanner implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Scanner`], which walks one or more root
//! directories and yields [`FileRecord`]s for duplicate detection. It uses
//! [`jwalk`] for parallel directory walking.
//!
//! # Features
//!
//! - Parallel traversal across subdirectories, with an at-most-once
//!   guarantee per canonical file path (overlapping roots are deduplicated)
//! - Exclusion rules: case-insensitive substring match on directory names
//!   plus gitignore-style patterns via the `ignore` crate
//! - Symlink cycle detection via visited canonical directory paths
//! - `max_files` cap with a truncation flag for partial scans
//! - Graceful shutdown via atomic flag
//!
//! Size and modification time are read from metadata only; no file content
//! is touched at this stage.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileRecord, ScanError, ScanOptions};

/// Directory scanner for file discovery across one or more roots.
#[derive(Debug)]
pub struct Scanner {
    /// Root paths to walk
    roots: Vec<PathBuf>,
    /// Scan configuration
    options: ScanOptions,
    /// Optional cancellation flag for graceful termination
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl Scanner {
    /// Create a new scanner over the given roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, options: ScanOptions) -> Self {
        Self {
            roots,
            options,
            cancel_flag: None,
        }
    }

    /// Set the cancellation flag for graceful termination.
    ///
    /// When the flag is set, the scan stops yielding as soon as possible.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Walk the roots, yielding file records lazily.
    ///
    /// The returned iterator is forward-only and non-restartable; each record
    /// is yielded at most once even when roots overlap. Per-path errors are
    /// yielded as [`ScanError`] values rather than stopping iteration. After
    /// exhaustion, [`ScanIter::truncated`] reports whether the `max_files`
    /// cap cut the scan short.
    #[must_use]
    pub fn scan(&self) -> ScanIter {
        let gitignore = build_gitignore(&self.roots, &self.options.exclude_globs);
        let visited_dirs: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));

        let mut inner: Vec<RootWalk> = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            inner.push(self.walk_root(root.clone(), gitignore.clone(), Arc::clone(&visited_dirs)));
        }

        ScanIter {
            walks: inner.into_iter(),
            current: None,
            options: self.options.clone(),
            cancel_flag: self.cancel_flag.clone(),
            seen_files: HashSet::new(),
            yielded: 0,
            truncated: false,
            done: false,
        }
    }

    /// Build the jwalk iterator for one root.
    fn walk_root(
        &self,
        root: PathBuf,
        gitignore: Option<Arc<Gitignore>>,
        visited_dirs: Arc<Mutex<HashSet<PathBuf>>>,
    ) -> RootWalk {
        let substrings: Arc<Vec<String>> = Arc::new(
            self.options
                .exclude_substrings
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        );
        let follow_symlinks = self.options.follow_symlinks;
        let root_for_closure = root.clone();
        let gitignore_for_closure = gitignore.clone();

        let walk = WalkDir::new(&root)
            .follow_links(follow_symlinks)
            .skip_hidden(false)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });

                for child in children.iter_mut().flatten() {
                    if !child.file_type().is_dir() {
                        continue;
                    }
                    let path = child.path();

                    if dir_excluded(&path, &substrings)
                        || matches_gitignore(&path, true, &root_for_closure, gitignore_for_closure.as_deref())
                    {
                        log::trace!("Excluding directory: {}", path.display());
                        child.read_children_path = None;
                        continue;
                    }

                    // Cycle detection: never descend into a canonical
                    // directory twice when following symlinks.
                    if follow_symlinks {
                        match path.canonicalize() {
                            Ok(canon) => {
                                let mut visited =
                                    visited_dirs.lock().expect("visited set poisoned");
                                if !visited.insert(canon) {
                                    log::debug!(
                                        "Skipping already-visited directory (symlink cycle?): {}",
                                        path.display()
                                    );
                                    child.read_children_path = None;
                                }
                            }
                            Err(e) => {
                                log::warn!("Cannot canonicalize {}: {}", path.display(), e);
                                child.read_children_path = None;
                            }
                        }
                    }
                }
            });

        RootWalk {
            root,
            gitignore,
            iter: walk.into_iter(),
        }
    }
}

/// One root's jwalk iterator plus the context needed to filter its entries.
struct RootWalk {
    root: PathBuf,
    gitignore: Option<Arc<Gitignore>>,
    iter: jwalk::DirEntryIter<((), ())>,
}

/// Lazy, forward-only iterator over scanned file records.
pub struct ScanIter {
    walks: std::vec::IntoIter<RootWalk>,
    current: Option<RootWalk>,
    options: ScanOptions,
    cancel_flag: Option<Arc<AtomicBool>>,
    seen_files: HashSet<PathBuf>,
    yielded: usize,
    truncated: bool,
    done: bool,
}

impl ScanIter {
    /// Whether the scan stopped early because `max_files` was reached.
    ///
    /// Meaningful once the iterator has been exhausted.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Pull the next raw entry, advancing across roots.
    fn next_raw(&mut self) -> Option<(PathBuf, Result<jwalk::DirEntry<((), ())>, jwalk::Error>)> {
        loop {
            if self.current.is_none() {
                self.current = self.walks.next();
            }
            let walk = self.current.as_mut()?;
            match walk.iter.next() {
                Some(item) => return Some((walk.root.clone(), item)),
                None => self.current = None,
            }
        }
    }

    /// Filter one raw entry into a record, an error, or nothing.
    fn process_entry(
        &mut self,
        root: &Path,
        entry: jwalk::DirEntry<((), ())>,
    ) -> Option<Result<FileRecord, ScanError>> {
        let path = entry.path();

        if path == *root {
            return None;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }

        let gitignore = self
            .current
            .as_ref()
            .and_then(|w| w.gitignore.as_deref());
        if matches_gitignore(&path, false, root, gitignore) {
            log::trace!("Excluding file: {}", path.display());
            return None;
        }

        let is_symlink = file_type.is_symlink();
        if is_symlink && !self.options.follow_symlinks {
            log::trace!("Skipping symlink: {}", path.display());
            return None;
        }

        let metadata = if self.options.follow_symlinks {
            std::fs::metadata(&path)
        } else {
            std::fs::symlink_metadata(&path)
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => return Some(Err(io_scan_error(&path, e))),
        };

        // Not a regular file after following the symlink
        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();
        if size < self.options.min_size {
            log::trace!("Skipping file below min size ({}): {}", size, path.display());
            return None;
        }

        if !passes_regex_filter(
            &path,
            &self.options.regex_include,
            &self.options.regex_exclude,
        ) {
            log::trace!("Skipping file due to regex filter: {}", path.display());
            return None;
        }

        // Normalize to a canonical absolute path; this also backs the
        // at-most-once guarantee across overlapping roots.
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !self.seen_files.insert(canonical.clone()) {
            log::trace!("Already yielded: {}", path.display());
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(FileRecord::new(canonical, size, modified)))
    }
}

impl Iterator for ScanIter {
    type Item = Result<FileRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.is_cancelled() {
                log::debug!("Scanner: cancellation requested, stopping iteration");
                self.done = true;
                return None;
            }

            if let Some(max) = self.options.max_files {
                if self.yielded >= max {
                    // Only a further entry that would actually yield counts
                    // as proof of a partial scan; trailing directories or
                    // filtered-out files do not.
                    while let Some((root, item)) = self.next_raw() {
                        let would_yield = match item {
                            Ok(entry) => self.process_entry(&root, entry).is_some(),
                            Err(_) => true,
                        };
                        if would_yield {
                            self.truncated = true;
                            log::warn!("Scan truncated after {} files", max);
                            break;
                        }
                    }
                    self.done = true;
                    return None;
                }
            }

            let (root, item) = self.next_raw()?;
            match item {
                Ok(entry) => match self.process_entry(&root, entry) {
                    Some(Ok(record)) => {
                        self.yielded += 1;
                        return Some(Ok(record));
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => continue,
                },
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Scanner error for {}: {}", path.display(), e);
                    return Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }));
                }
            }
        }
    }
}

/// Build a gitignore matcher from configured glob patterns.
fn build_gitignore(roots: &[PathBuf], patterns: &[String]) -> Option<Arc<Gitignore>> {
    if patterns.is_empty() {
        return None;
    }

    // Patterns are anchored relative to the first root; matching falls back
    // to the full path for other roots.
    let base = roots.first().cloned().unwrap_or_else(|| PathBuf::from("."));
    let mut builder = GitignoreBuilder::new(&base);
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            log::warn!("Invalid exclude pattern '{}': {}", pattern, e);
        }
    }

    match builder.build() {
        Ok(gi) if !gi.is_empty() => Some(Arc::new(gi)),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Failed to build exclude patterns: {}", e);
            None
        }
    }
}

/// Case-insensitive substring match against the final path component.
fn dir_excluded(path: &Path, substrings: &[String]) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    substrings.iter().any(|pat| name.contains(pat))
}

/// Gitignore-style matching relative to the scan root.
fn matches_gitignore(path: &Path, is_dir: bool, root: &Path, gitignore: Option<&Gitignore>) -> bool {
    let Some(gi) = gitignore else {
        return false;
    };

    let relative = path.strip_prefix(root).unwrap_or(path);
    let path_str = relative.to_string_lossy();
    let normalized = if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    };

    gi.matched(normalized, is_dir).is_ignore()
}

/// Regex filtering on the file name.
fn passes_regex_filter(path: &Path, include: &[regex::Regex], exclude: &[regex::Regex]) -> bool {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    if !include.is_empty() && !include.iter().any(|re| re.is_match(&filename)) {
        return false;
    }

    !exclude.iter().any(|re| re.is_match(&filename))
}

fn io_scan_error(path: &Path, error: std::io::Error) -> ScanError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::PermissionDenied => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path.to_path_buf())
        }
        ErrorKind::NotFound => {
            log::debug!("File vanished mid-scan: {}", path.display());
            ScanError::NotFound(path.to_path_buf())
        }
        _ => {
            log::warn!("I/O error for {}: {}", path.display(), error);
            ScanError::Io {
                path: path.to_path_buf(),
                source: error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    /// Create a test directory with some files.
    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();

        let file1 = dir.path().join("file1.txt");
        let mut f = File::create(&file1).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let file2 = dir.path().join("file2.txt");
        let mut f = File::create(&file2).unwrap();
        writeln!(f, "Another file").unwrap();

        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let file3 = subdir.join("nested.txt");
        let mut f = File::create(&file3).unwrap();
        writeln!(f, "Nested file content").unwrap();

        dir
    }

    fn collect_records(scanner: &Scanner) -> Vec<FileRecord> {
        scanner.scan().filter_map(Result::ok).collect()
    }

    #[test]
    fn test_scanner_finds_files() {
        let dir = create_test_dir();
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], ScanOptions::default());

        let records = collect_records(&scanner);

        assert_eq!(records.len(), 3);
        for record in &records {
            assert!(record.size > 0);
            assert!(record.path.is_absolute());
            assert!(record.digest.is_none());
        }
    }

    #[test]
    fn test_scanner_skips_empty_files() {
        let dir = create_test_dir();
        File::create(dir.path().join("empty.txt")).unwrap();

        let scanner = Scanner::new(vec![dir.path().to_path_buf()], ScanOptions::default());
        let records = collect_records(&scanner);

        assert_eq!(records.len(), 3);
        for record in &records {
            assert!(record.size > 0);
        }
    }

    #[test]
    fn test_scanner_substring_excludes() {
        let dir = create_test_dir();

        let git_dir = dir.path().join(".git");
        fs::create_dir(&git_dir).unwrap();
        let mut f = File::create(git_dir.join("HEAD")).unwrap();
        writeln!(f, "ref: refs/heads/main").unwrap();

        let cache_dir = dir.path().join("__pycache__");
        fs::create_dir(&cache_dir).unwrap();
        let mut f = File::create(cache_dir.join("mod.pyc")).unwrap();
        writeln!(f, "bytecode").unwrap();

        let scanner = Scanner::new(vec![dir.path().to_path_buf()], ScanOptions::default());
        let records = collect_records(&scanner);

        assert_eq!(records.len(), 3);
        for record in &records {
            let p = record.path.to_string_lossy();
            assert!(!p.contains(".git"), "excluded dir leaked: {}", p);
            assert!(!p.contains("__pycache__"), "excluded dir leaked: {}", p);
        }
    }

    #[test]
    fn test_scanner_glob_excludes() {
        let dir = create_test_dir();

        let mut f = File::create(dir.path().join("temp.tmp")).unwrap();
        writeln!(f, "Temporary file").unwrap();
        let mut f = File::create(dir.path().join("debug.log")).unwrap();
        writeln!(f, "Log content").unwrap();

        let options = ScanOptions {
            exclude_globs: vec!["*.tmp".to_string(), "*.log".to_string()],
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);
        let records = collect_records(&scanner);

        for record in &records {
            let name = record.path.file_name().unwrap().to_str().unwrap();
            assert!(!name.ends_with(".tmp"));
            assert!(!name.ends_with(".log"));
        }
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_scanner_max_files_truncates() {
        let dir = TempDir::new().unwrap();
        for i in 0..50 {
            let mut f = File::create(dir.path().join(format!("file{:03}.txt", i))).unwrap();
            writeln!(f, "content {}", i).unwrap();
        }

        let options = ScanOptions {
            max_files: Some(10),
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);

        let mut scan = scanner.scan();
        let records: Vec<_> = scan.by_ref().filter_map(Result::ok).collect();

        assert_eq!(records.len(), 10);
        assert!(scan.truncated());
    }

    #[test]
    fn test_scanner_max_files_not_truncated_when_fewer() {
        let dir = create_test_dir();

        let options = ScanOptions {
            max_files: Some(100),
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);

        let mut scan = scanner.scan();
        let records: Vec<_> = scan.by_ref().filter_map(Result::ok).collect();

        assert_eq!(records.len(), 3);
        assert!(!scan.truncated());
    }

    #[test]
    fn test_scanner_exact_cap_with_trailing_dir_not_truncated() {
        let dir = TempDir::new().unwrap();
        for i in 0..3 {
            let mut f = File::create(dir.path().join(format!("file{}.txt", i))).unwrap();
            writeln!(f, "content {}", i).unwrap();
        }
        // Sorts after the files, so the walker sees it once the cap is hit.
        fs::create_dir(dir.path().join("zzz_empty")).unwrap();

        let options = ScanOptions {
            max_files: Some(3),
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);

        let mut scan = scanner.scan();
        let records: Vec<_> = scan.by_ref().filter_map(Result::ok).collect();

        assert_eq!(records.len(), 3);
        assert!(!scan.truncated());
    }

    #[test]
    fn test_scanner_overlapping_roots_yield_once() {
        let dir = create_test_dir();
        let sub = dir.path().join("subdir");

        let scanner = Scanner::new(
            vec![dir.path().to_path_buf(), sub],
            ScanOptions::default(),
        );
        let records = collect_records(&scanner);

        // nested.txt is reachable from both roots but must appear once
        assert_eq!(records.len(), 3);
        let nested: Vec<_> = records
            .iter()
            .filter(|r| r.path.file_name().is_some_and(|n| n == "nested.txt"))
            .collect();
        assert_eq!(nested.len(), 1);
    }

    #[test]
    fn test_scanner_cancel_flag() {
        let dir = create_test_dir();

        let cancel = Arc::new(AtomicBool::new(true));
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], ScanOptions::default())
            .with_cancel_flag(Arc::clone(&cancel));

        let records = collect_records(&scanner);
        assert!(records.is_empty());
    }

    #[test]
    fn test_scanner_handles_nonexistent_root() {
        let scanner = Scanner::new(
            vec![PathBuf::from("/nonexistent/path/12345")],
            ScanOptions::default(),
        );

        let results: Vec<_> = scanner.scan().collect();
        assert!(results.is_empty() || results.iter().all(Result::is_err));
    }

    #[test]
    #[cfg(unix)]
    fn test_scanner_symlinks_skipped_by_default() {
        use std::os::unix::fs::symlink;

        let dir = create_test_dir();
        symlink(dir.path().join("file1.txt"), dir.path().join("link1.txt")).unwrap();

        let scanner = Scanner::new(vec![dir.path().to_path_buf()], ScanOptions::default());
        let records = collect_records(&scanner);

        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.path.file_name().is_some_and(|n| n != "link1.txt")));
    }

    #[test]
    fn test_scanner_follow_symlinks_yields_records() {
        let dir = create_test_dir();

        let options = ScanOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);
        let records = collect_records(&scanner);

        assert_eq!(records.len(), 3);
    }

    #[test]
    #[cfg(unix)]
    fn test_scanner_symlink_cycle_detected() {
        use std::os::unix::fs::symlink;

        let dir = create_test_dir();
        // subdir/loop -> the root itself
        symlink(dir.path(), dir.path().join("subdir").join("loop")).unwrap();

        let options = ScanOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);

        // Must terminate; each real file appears exactly once.
        let records = collect_records(&scanner);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_regex_filters() {
        let dir = create_test_dir();

        let options = ScanOptions {
            regex_include: vec![regex::Regex::new("file").unwrap()],
            regex_exclude: vec![regex::Regex::new("2").unwrap()],
            ..Default::default()
        };
        let scanner = Scanner::new(vec![dir.path().to_path_buf()], options);
        let records = collect_records(&scanner);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path.file_name().unwrap(), "file1.txt");
    }
}
