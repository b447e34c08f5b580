//! dupsweep - safe duplicate file sweeper.
//!
//! Finds duplicate files by content (BLAKE3 over size buckets), keeps one
//! copy per group under a configurable rule, and moves the rest into a
//! review folder. Deletion is opt-in and defaults to the system trash.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod recommend;
pub mod resolve;
pub mod scanner;
pub mod session;
pub mod signal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::cli::{Cli, Commands, OutputFormat, ReportArgs, ScanArgs};
use crate::config::{EngineConfig, DEFAULT_REVIEW_DIR_NAME};
use crate::error::ExitCode;
use crate::output::{load_report, persist_report, CsvOutput, JsonOutput};
use crate::progress::{ConsoleProgress, SilentProgress};
use crate::recommend::{Recommender, RuleBasedRecommender};
use crate::session::{ScanSession, SessionReport};

/// Run the application with parsed CLI arguments.
///
/// # Errors
///
/// Returns an error for fatal failures (invalid configuration, unreadable
/// report file); per-file failures are reported through the exit code, not
/// as errors.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Scan(args) => run_scan(args, cli.quiet),
        Commands::Report(args) => run_report(&args),
    }
}

fn run_scan(args: ScanArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    if args.delete && !args.yes {
        anyhow::bail!("--delete removes files; pass --yes to confirm");
    }

    let config = build_config(&args)?;
    let handler = signal::install_handler();

    let progress: Arc<dyn progress::ProgressCallback> =
        if quiet || args.output != OutputFormat::Text {
            Arc::new(SilentProgress)
        } else {
            Arc::new(ConsoleProgress::new())
        };

    let session = ScanSession::new(config.clone())
        .context("invalid configuration")?
        .with_cancel_flag(handler.get_flag())
        .with_progress(progress);

    let report = session.run();

    if !args.no_report && !config.dry_run {
        std::fs::create_dir_all(&config.review_dir).with_context(|| {
            format!(
                "cannot create review directory {}",
                config.review_dir.display()
            )
        })?;
        persist_report(&report, &config.review_dir).context("failed to persist run report")?;
    }

    render(&report, args.output, quiet)?;

    Ok(exit_code_for(&report))
}

fn build_config(args: &ScanArgs) -> anyhow::Result<EngineConfig> {
    let first_root = args
        .roots
        .first()
        .ok_or_else(|| anyhow::anyhow!("at least one scan root is required"))?;
    let review_dir = args
        .review_dir
        .clone()
        .unwrap_or_else(|| first_root.join(DEFAULT_REVIEW_DIR_NAME));

    let defaults = EngineConfig::default();
    let mut exclude_substrings = defaults.exclude_substrings;
    exclude_substrings.extend(args.exclude_substrings.iter().cloned());

    Ok(EngineConfig {
        roots: args.roots.clone(),
        review_dir,
        exclude_substrings,
        exclude_globs: args.exclude_globs.clone(),
        regex_include: args.regex_include.clone(),
        regex_exclude: args.regex_exclude.clone(),
        follow_symlinks: args.follow_symlinks,
        max_files: args.max_files,
        min_size: args.min_size.unwrap_or(1),
        keep_rule: args.keep_rule.into(),
        delete_duplicates: args.delete,
        permanent_delete: args.permanent,
        paranoid: args.paranoid,
        io_threads: args.io_threads,
        io_timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        dry_run: args.dry_run,
    })
}

fn run_report(args: &ReportArgs) -> anyhow::Result<ExitCode> {
    let report = load_report(&args.path)
        .with_context(|| format!("cannot load report {}", args.path.display()))?;
    render(&report, args.output, false)?;
    Ok(exit_code_for(&report))
}

fn render(report: &SessionReport, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            if !quiet {
                print!("{}", output::render_summary(report));
                let suggestions = RuleBasedRecommender::new().recommend(report);
                if !suggestions.is_empty() {
                    println!("\nSuggestions:");
                    for suggestion in suggestions {
                        println!("  - {suggestion}");
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", JsonOutput::new(report).to_json_pretty()?);
        }
        OutputFormat::Csv => {
            CsvOutput::new(&report.execution.outcomes).write_to(std::io::stdout())?;
        }
    }
    Ok(())
}

fn exit_code_for(report: &SessionReport) -> ExitCode {
    if report.execution.cancelled {
        ExitCode::Interrupted
    } else if report.execution.has_failures() || report.scan_errors > 0 {
        ExitCode::PartialSuccess
    } else if !report.found_duplicates() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}
