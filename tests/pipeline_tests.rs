//! End-to-end pipeline tests: scan, hash, resolve, execute against real
//! directory trees.

use std::fs;
use std::path::{Path, PathBuf};

use dupsweep::config::EngineConfig;
use dupsweep::resolve::KeepRule;
use dupsweep::session::ScanSession;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn config_for(root: &Path, review: &Path) -> EngineConfig {
    EngineConfig {
        roots: vec![root.to_path_buf()],
        review_dir: review.to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn test_empty_directory_finds_nothing() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();

    let report = ScanSession::new(config_for(root.path(), &review.path().join("r")))
        .unwrap()
        .run();

    assert!(report.groups.is_empty());
    assert_eq!(report.scan.total_files, 0);
}

#[test]
fn test_unique_files_untouched() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    let a = write_file(root.path(), "a.txt", b"content a");
    let b = write_file(root.path(), "b.txt", b"content bb");
    let c = write_file(root.path(), "c.txt", b"content ccc");

    let report = ScanSession::new(config_for(root.path(), &review.path().join("r")))
        .unwrap()
        .run();

    assert!(report.groups.is_empty());
    assert!(a.exists() && b.exists() && c.exists());
}

#[test]
fn test_duplicates_moved_keeper_is_shortest_path() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    let review_dir = review.path().join("review_duplicate");

    let keeper = write_file(root.path(), "doc.txt", b"shared body");
    let moved_a = write_file(root.path(), "archive/doc.txt", b"shared body");
    let moved_b = write_file(root.path(), "archive/old/doc.txt", b"shared body");

    let report = ScanSession::new(config_for(root.path(), &review_dir))
        .unwrap()
        .run();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.execution.succeeded(), 2);
    assert!(keeper.exists());
    assert!(!moved_a.exists());
    assert!(!moved_b.exists());

    // Both displaced copies were named doc.txt; the second gets a counter
    // suffix instead of clobbering the first.
    assert!(review_dir.join("doc.txt").exists());
    assert!(review_dir.join("doc_1.txt").exists());
}

#[test]
fn test_keep_rule_oldest_modified() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();

    let old = write_file(root.path(), "sub/old.txt", b"same bytes");
    let new = write_file(root.path(), "new.txt", b"same bytes");
    filetime::set_file_mtime(&old, filetime::FileTime::from_unix_time(1_000_000, 0)).unwrap();
    filetime::set_file_mtime(&new, filetime::FileTime::from_unix_time(2_000_000, 0)).unwrap();

    let config = EngineConfig {
        keep_rule: KeepRule::OldestModified,
        ..config_for(root.path(), &review.path().join("r"))
    };
    let report = ScanSession::new(config).unwrap().run();

    assert_eq!(report.execution.succeeded(), 1);
    assert!(old.exists(), "oldest copy must be kept");
    assert!(!new.exists());
}

#[test]
fn test_max_files_truncation_is_flagged() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    for i in 0..500 {
        // Unique sizes so no duplicates exist; only the cap matters here.
        write_file(root.path(), &format!("f{i:03}.bin"), &vec![b'x'; i + 1]);
    }

    let config = EngineConfig {
        max_files: Some(100),
        ..config_for(root.path(), &review.path().join("r"))
    };
    let report = ScanSession::new(config).unwrap().run();

    assert!(report.execution.scan_truncated);
    assert_eq!(report.execution.files_scanned, 100);
}

#[test]
fn test_under_cap_not_flagged() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    for i in 0..10 {
        write_file(root.path(), &format!("f{i}.bin"), &vec![b'x'; i + 1]);
    }

    let config = EngineConfig {
        max_files: Some(100),
        ..config_for(root.path(), &review.path().join("r"))
    };
    let report = ScanSession::new(config).unwrap().run();

    assert!(!report.execution.scan_truncated);
    assert_eq!(report.execution.files_scanned, 10);
}

#[test]
fn test_excluded_directories_skipped() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    let visible = write_file(root.path(), "a.txt", b"payload");
    let hidden = write_file(root.path(), ".git/objects/a.txt", b"payload");

    let report = ScanSession::new(config_for(root.path(), &review.path().join("r")))
        .unwrap()
        .run();

    // The .git copy is never scanned, so no duplicate pair exists.
    assert!(report.groups.is_empty());
    assert!(visible.exists() && hidden.exists());
}

#[test]
fn test_regex_exclude_filters_files() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    let original = write_file(root.path(), "notes.txt", b"shared payload");
    let backup = write_file(root.path(), "backup_notes.txt", b"shared payload");

    let config = EngineConfig {
        regex_exclude: vec![regex::Regex::new("^backup_").unwrap()],
        ..config_for(root.path(), &review.path().join("r"))
    };
    let report = ScanSession::new(config).unwrap().run();

    // The backup copy never enters the scan, so no pair is formed.
    assert!(report.groups.is_empty());
    assert_eq!(report.scan.total_files, 1);
    assert!(original.exists() && backup.exists());
}

#[test]
fn test_min_size_skips_empty_files() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    write_file(root.path(), "a.empty", b"");
    write_file(root.path(), "b.empty", b"");

    let report = ScanSession::new(config_for(root.path(), &review.path().join("r")))
        .unwrap()
        .run();

    assert!(report.groups.is_empty());
    assert_eq!(report.scan.total_files, 0);
}

#[test]
fn test_permanent_delete_removes_duplicates() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    let keeper = write_file(root.path(), "a.txt", b"delete me twice");
    let dupe = write_file(root.path(), "nested/b.txt", b"delete me twice");

    let config = EngineConfig {
        delete_duplicates: true,
        permanent_delete: true,
        ..config_for(root.path(), &review.path().join("r"))
    };
    let report = ScanSession::new(config).unwrap().run();

    assert_eq!(report.execution.succeeded(), 1);
    assert!(keeper.exists());
    assert!(!dupe.exists());
}

#[test]
fn test_paranoid_mode_confirms_real_duplicates() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    write_file(root.path(), "a.txt", b"identical payload");
    write_file(root.path(), "sub/b.txt", b"identical payload");

    let config = EngineConfig {
        paranoid: true,
        dry_run: true,
        ..config_for(root.path(), &review.path().join("r"))
    };
    let report = ScanSession::new(config).unwrap().run();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.hashing.collision_mismatches, 0);
}

#[test]
fn test_review_dir_inside_root_not_rescanned() {
    let root = tempdir().unwrap();
    let review_dir = root.path().join("review_duplicate");

    write_file(root.path(), "a.txt", b"nested review case");
    write_file(root.path(), "sub/b.txt", b"nested review case");

    let config = config_for(root.path(), &review_dir);
    let first = ScanSession::new(config.clone()).unwrap().run();
    assert_eq!(first.execution.succeeded(), 1);
    assert!(review_dir.join("b.txt").exists());

    // The displaced copy now lives under the root, but the review folder
    // is filtered from scanning, so it never pairs with the keeper again.
    let second = ScanSession::new(config).unwrap().run();
    assert!(second.groups.is_empty());
    assert!(review_dir.join("b.txt").exists());
}

#[test]
fn test_multiple_overlapping_roots_deduplicated() {
    let root = tempdir().unwrap();
    let review = tempdir().unwrap();
    let sub = root.path().join("sub");
    write_file(root.path(), "sub/a.txt", b"counted once");

    let config = EngineConfig {
        roots: vec![root.path().to_path_buf(), sub],
        review_dir: review.path().join("r"),
        ..Default::default()
    };
    let report = ScanSession::new(config).unwrap().run();

    // The file is reachable from both roots but must be recorded once,
    // so it can never pair with itself as a duplicate.
    assert_eq!(report.scan.total_files, 1);
    assert!(report.groups.is_empty());
}
