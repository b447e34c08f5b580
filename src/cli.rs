//! Command-line interface definitions.
//!
//! All arguments and subcommands are declared with the clap derive API:
//! global options (verbosity, structured errors) on the top-level parser,
//! subcommands for scanning and report inspection.
//!
//! # Example
//!
//! ```bash
//! # Move duplicates under ~/Downloads into a review folder
//! dupsweep scan ~/Downloads
//!
//! # Preview only, machine-readable output
//! dupsweep scan ~/Downloads --dry-run --output json
//!
//! # Delete duplicates via the system trash, keeping the oldest copy
//! dupsweep scan ~/data --delete --yes --keep-rule oldest-modified
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::resolve::KeepRule;

/// Safe duplicate file sweeper.
///
/// dupsweep finds duplicate files by content (BLAKE3), keeps one copy per
/// group under a configurable rule, and moves the rest into a review folder
/// for later inspection. Deletion is strictly opt-in and defaults to the
/// system trash.
#[derive(Debug, Parser)]
#[command(name = "dupsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit errors as structured JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan directories and resolve duplicates
    Scan(ScanArgs),
    /// Summarize a previously persisted run report
    Report(ReportArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Root directories to scan (overlaps are deduplicated)
    #[arg(value_name = "ROOTS", required = true)]
    pub roots: Vec<PathBuf>,

    /// Review destination for displaced duplicates
    ///
    /// Defaults to `review_duplicate` under the first root. Created on
    /// demand; the run aborts up front if it cannot be written.
    #[arg(long, value_name = "PATH")]
    pub review_dir: Option<PathBuf>,

    /// Which copy of each group to keep
    #[arg(long, value_enum, default_value = "shortest-path")]
    pub keep_rule: KeepRuleArg,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Minimum file size to consider (e.g., 1KB, 1MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB.
    /// Defaults to 1 byte, skipping empty files.
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Stop scanning after this many files (results flagged as partial)
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Case-insensitive directory-name substrings to skip
    /// (adds to the built-in defaults like .git and node_modules)
    #[arg(long = "exclude", value_name = "SUBSTRING")]
    pub exclude_substrings: Vec<String>,

    /// Gitignore-style glob patterns to skip
    #[arg(long = "exclude-glob", value_name = "PATTERN")]
    pub exclude_globs: Vec<String>,

    /// Only consider files whose name matches at least one regex
    #[arg(long = "include-regex", value_name = "REGEX")]
    pub regex_include: Vec<regex::Regex>,

    /// Skip files whose name matches any regex
    #[arg(long = "exclude-regex", value_name = "REGEX")]
    pub regex_exclude: Vec<regex::Regex>,

    /// Follow symbolic links during scan (cycles are detected and skipped)
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", default_value = "4")]
    pub io_threads: usize,

    /// Per-file I/O timeout in seconds (0 disables the timeout)
    #[arg(long, value_name = "SECS", default_value = "120")]
    pub timeout: u64,

    /// Enable paranoid mode: byte-by-byte verification after hash match
    ///
    /// Slower but guarantees no hash collisions.
    #[arg(long)]
    pub paranoid: bool,

    /// Delete duplicates instead of moving them to the review folder
    #[arg(long)]
    pub delete: bool,

    /// Use permanent deletion instead of moving to trash
    ///
    /// Warning: files cannot be recovered after permanent deletion.
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Skip confirmation prompts (required with --delete in non-interactive mode)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Verify and report without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip writing the JSON run report into the review folder
    #[arg(long)]
    pub no_report: bool,
}

/// Arguments for the report subcommand.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Run report file to summarize
    #[arg(value_name = "REPORT_FILE")]
    pub path: PathBuf,

    /// Output format for the summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for run results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON output for scripting
    Json,
    /// CSV output for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// CLI-facing keep rule, mapped onto the resolver's [`KeepRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepRuleArg {
    /// Keep the copy with the shortest path (closest to a root)
    ShortestPath,
    /// Keep the copy with the earliest modification time
    OldestModified,
}

impl From<KeepRuleArg> for KeepRule {
    fn from(arg: KeepRuleArg) -> Self {
        match arg {
            KeepRuleArg::ShortestPath => KeepRule::ShortestPath,
            KeepRuleArg::OldestModified => KeepRule::OldestModified,
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB.
/// Case-insensitive; numbers without a suffix are bytes.
///
/// # Examples
///
/// ```
/// use dupsweep::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
