//! Filesystem actions: executing resolved decisions safely.
//!
//! This module is the only place allowed to mutate the real filesystem.
//! Everything upstream (scanner, grouper, resolver) is read-only.
//!
//! # Safety
//!
//! - Every source is re-verified (exists, size unchanged since scan) before
//!   it is touched.
//! - Moves are atomic renames on the same volume, and copy-verify-remove
//!   across volumes; a file is never left half-copied with its origin gone.
//! - Re-running completed decisions is a no-op, not an error.
//! - Deletion goes to the system trash unless permanent deletion was
//!   explicitly requested.

pub mod executor;

pub use executor::{
    DecisionOutcome, DecisionState, ExecuteError, ExecutionReport, Executor, ExecutorOptions,
    Outcome,
};
