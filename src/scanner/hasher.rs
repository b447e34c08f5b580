//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] for computing BLAKE3 digests of file
//! contents using memory-efficient streaming: files are read in bounded
//! chunks, never loaded whole into memory. Files at or above
//! [`MMAP_THRESHOLD`] use BLAKE3's memory-mapped multi-threaded path instead.
//!
//! Two files with equal digest and equal size are treated as byte-identical.
//! Callers that want a zero-false-positive guarantee can additionally run
//! [`files_identical`] before trusting a digest match.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// A 32-byte BLAKE3 content digest.
pub type Digest = [u8; 32];

/// Buffer size for streaming reads (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Files at or above this size are hashed via memory mapping.
pub const MMAP_THRESHOLD: u64 = 128 * 1024;

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing did not complete within the configured timeout.
    #[error("timed out hashing {0}")]
    Timeout(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Content hasher for duplicate detection.
///
/// Stateless and cheap to copy; safe to share across rayon workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher;

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute the BLAKE3 digest of a file's full content.
    ///
    /// Small files are streamed through a 64 KiB buffer; larger files use
    /// BLAKE3's memory-mapped rayon path.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file is missing, unreadable, or fails
    /// mid-read. Such failures are per-file and never abort a whole scan.
    pub fn hash_file(&self, path: &Path) -> Result<Digest, HashError> {
        let metadata = std::fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;

        if metadata.len() >= MMAP_THRESHOLD {
            let mut hasher = blake3::Hasher::new();
            hasher
                .update_mmap_rayon(path)
                .map_err(|e| HashError::from_io(path, e))?;
            return Ok(*hasher.finalize().as_bytes());
        }

        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; CHUNK_SIZE];

        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| HashError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Compute a digest with a per-file timeout.
    ///
    /// The hash runs on a helper thread; if it does not finish within
    /// `timeout`, [`HashError::Timeout`] is returned and the file is skipped
    /// rather than stalling the batch. The helper thread is detached and will
    /// finish (or fail) on its own.
    pub fn hash_file_with_timeout(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<Digest, HashError> {
        let (tx, rx) = mpsc::channel();
        let owned = path.to_path_buf();
        let hasher = *self;

        std::thread::spawn(move || {
            // Receiver may be gone already after a timeout.
            let _ = tx.send(hasher.hash_file(&owned));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Hashing timed out after {:?}: {}", timeout, path.display());
                Err(HashError::Timeout(path.to_path_buf()))
            }
        }
    }
}

/// Render a digest as a lowercase hex string.
#[must_use]
pub fn digest_to_hex(digest: &Digest) -> String {
    blake3::Hash::from_bytes(*digest).to_hex().to_string()
}

/// Byte-for-byte comparison of two files using bounded buffers.
///
/// Used as the optional collision-confirming compare after a digest match:
/// equal digests with unequal bytes must never be merged into one group.
///
/// # Errors
///
/// Returns [`HashError`] if either file cannot be read.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool, HashError> {
    let fa = File::open(a).map_err(|e| HashError::from_io(a, e))?;
    let fb = File::open(b).map_err(|e| HashError::from_io(b, e))?;

    if fa.metadata().map_err(|e| HashError::from_io(a, e))?.len()
        != fb.metadata().map_err(|e| HashError::from_io(b, e))?.len()
    {
        return Ok(false);
    }

    let mut ra = BufReader::with_capacity(CHUNK_SIZE, fa);
    let mut rb = BufReader::with_capacity(CHUNK_SIZE, fb);
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        let na = read_full(&mut ra, &mut buf_a).map_err(|e| HashError::from_io(a, e))?;
        let nb = read_full(&mut rb, &mut buf_b).map_err(|e| HashError::from_io(b, e))?;

        if na != nb || buf_a[..na] != buf_b[..nb] {
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }
    }
}

/// Read as many bytes as possible into `buf`, retrying short reads.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
