//! Rule-based recommendations derived from a finished run.
//!
//! Recommendation generators sit behind the [`Recommender`] trait so the CLI
//! can render advice from any source; the only implementation shipped here
//! is the fully offline [`RuleBasedRecommender`], which derives suggestions
//! from the report itself without touching the network.

use bytesize::ByteSize;

use crate::session::SessionReport;

/// Group size above which duplicates are flagged as cleanup priorities.
const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Reclaimable total above which a space warning is emitted.
const SIGNIFICANT_SPACE_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Maximum number of suggestions returned per run.
const MAX_SUGGESTIONS: usize = 5;

/// A source of human-readable advice about a finished run.
pub trait Recommender {
    /// Produce ordered suggestions for the given report.
    fn recommend(&self, report: &SessionReport) -> Vec<String>;
}

/// Offline recommender driven entirely by report statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedRecommender;

impl RuleBasedRecommender {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Recommender for RuleBasedRecommender {
    fn recommend(&self, report: &SessionReport) -> Vec<String> {
        let mut suggestions = Vec::new();
        let exec = &report.execution;

        if report.groups.is_empty() {
            if exec.scan_truncated {
                suggestions.push(
                    "Scan was capped before completing; raise or remove --max-files and re-run"
                        .to_string(),
                );
            } else {
                suggestions.push("No duplicates found; files appear well organized".to_string());
            }
            return suggestions;
        }

        let large_groups = report
            .groups
            .iter()
            .filter(|g| g.size > LARGE_FILE_THRESHOLD)
            .count();
        if large_groups > 0 {
            suggestions.push(format!(
                "Priority: {large_groups} duplicate groups exceed {}; handling those first reclaims the most space",
                ByteSize::b(LARGE_FILE_THRESHOLD)
            ));
        }

        if exec.bytes_reclaimable > SIGNIFICANT_SPACE_THRESHOLD {
            suggestions.push(format!(
                "Over {} is reclaimable; consider running with --delete after reviewing the report",
                ByteSize::b(SIGNIFICANT_SPACE_THRESHOLD)
            ));
        }

        if exec.dry_run {
            suggestions.push(
                "This was a dry run; re-run without --dry-run to move duplicates to review"
                    .to_string(),
            );
        }

        if exec.scan_truncated {
            suggestions.push(
                "Scan was capped; more duplicates may exist beyond the --max-files limit"
                    .to_string(),
            );
        }

        if exec.failed() > 0 {
            suggestions.push(format!(
                "{} actions failed; check the per-file reasons in the report and re-run, completed actions are skipped automatically",
                exec.failed()
            ));
        }

        if report.hashing.collision_mismatches > 0 {
            suggestions.push(format!(
                "{} digest matches failed the byte-for-byte check; keep --paranoid enabled for this tree",
                report.hashing.collision_mismatches
            ));
        }

        if suggestions.is_empty() {
            suggestions
                .push("Review the displaced copies, then empty the review folder".to_string());
        }

        suggestions.truncate(MAX_SUGGESTIONS);
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ExecutionReport;
    use crate::duplicates::{DuplicateGroup, GrouperStats, SizeBucketStats};
    use crate::scanner::FileRecord;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn report_with_groups(groups: Vec<DuplicateGroup>) -> SessionReport {
        SessionReport {
            scan: SizeBucketStats::default(),
            scan_errors: 0,
            hashing: GrouperStats::default(),
            groups,
            execution: ExecutionReport::default(),
        }
    }

    fn group_of_size(size: u64) -> DuplicateGroup {
        let make = |name: &str| FileRecord::new(PathBuf::from(name), size, SystemTime::UNIX_EPOCH);
        DuplicateGroup::new([1u8; 32], size, vec![make("/a"), make("/b")])
    }

    #[test]
    fn test_no_duplicates_message() {
        let suggestions = RuleBasedRecommender::new().recommend(&report_with_groups(Vec::new()));
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("No duplicates"));
    }

    #[test]
    fn test_large_groups_prioritized() {
        let report = report_with_groups(vec![group_of_size(50 * 1024 * 1024)]);
        let suggestions = RuleBasedRecommender::new().recommend(&report);
        assert!(suggestions.iter().any(|s| s.contains("Priority")));
    }

    #[test]
    fn test_failures_surfaced() {
        let mut report = report_with_groups(vec![group_of_size(10)]);
        report.execution.outcomes.push(crate::actions::DecisionOutcome {
            path: PathBuf::from("/a"),
            action: crate::resolve::Action::Delete,
            reason: String::new(),
            state: crate::actions::DecisionState::Failed,
            outcome: crate::actions::Outcome::Failed("boom".to_string()),
        });
        let suggestions = RuleBasedRecommender::new().recommend(&report);
        assert!(suggestions.iter().any(|s| s.contains("1 actions failed")));
    }

    #[test]
    fn test_capped_at_five() {
        let mut report = report_with_groups(vec![group_of_size(50 * 1024 * 1024)]);
        report.execution.bytes_reclaimable = 2 * 1024 * 1024 * 1024;
        report.execution.dry_run = true;
        report.execution.scan_truncated = true;
        report.hashing.collision_mismatches = 1;
        report.execution.outcomes.push(crate::actions::DecisionOutcome {
            path: PathBuf::from("/a"),
            action: crate::resolve::Action::Delete,
            reason: String::new(),
            state: crate::actions::DecisionState::Failed,
            outcome: crate::actions::Outcome::Failed("boom".to_string()),
        });

        let suggestions = RuleBasedRecommender::new().recommend(&report);
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
    }
}
