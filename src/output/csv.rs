//! CSV rendering, one row per executed decision.
//!
//! # Columns
//!
//! - `path`: source path the decision applied to
//! - `action`: `keep`, `move`, or `delete`
//! - `target`: review destination for moves, empty otherwise
//! - `state`: final state in the decision state machine
//! - `outcome`: `succeeded`, `skipped_already_done`, `failed`, `not_attempted`
//! - `reason`: policy reason or failure message

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::actions::{DecisionOutcome, DecisionState, Outcome};
use crate::resolve::Action;

/// Errors from CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow {
    path: String,
    action: &'static str,
    target: String,
    state: &'static str,
    outcome: &'static str,
    reason: String,
}

impl CsvRow {
    fn from_outcome(outcome: &DecisionOutcome) -> Self {
        let (action, target) = match &outcome.action {
            Action::Keep => ("keep", String::new()),
            Action::MoveToReview(dest) => ("move", dest.display().to_string()),
            Action::Delete => ("delete", String::new()),
        };
        let (kind, reason) = match &outcome.outcome {
            Outcome::Succeeded => ("succeeded", outcome.reason.clone()),
            Outcome::SkippedAlreadyDone => ("skipped_already_done", outcome.reason.clone()),
            Outcome::Failed(message) => ("failed", message.clone()),
            Outcome::NotAttempted => ("not_attempted", outcome.reason.clone()),
        };
        Self {
            path: outcome.path.display().to_string(),
            action,
            target,
            state: state_name(outcome.state),
            outcome: kind,
            reason,
        }
    }
}

fn state_name(state: DecisionState) -> &'static str {
    match state {
        DecisionState::Pending => "pending",
        DecisionState::Verified => "verified",
        DecisionState::Moved => "moved",
        DecisionState::Deleted => "deleted",
        DecisionState::Skipped => "skipped",
        DecisionState::Failed => "failed",
    }
}

/// CSV output formatter over a run's decision outcomes.
pub struct CsvOutput<'a> {
    outcomes: &'a [DecisionOutcome],
}

impl<'a> CsvOutput<'a> {
    #[must_use]
    pub fn new(outcomes: &'a [DecisionOutcome]) -> Self {
        Self { outcomes }
    }

    /// Write the CSV document to the given writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for outcome in self.outcomes {
            csv_writer.serialize(CsvRow::from_outcome(outcome))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Render the CSV document to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_csv_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
