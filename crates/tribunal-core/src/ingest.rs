//! Loads submission documents and feeds them to the store.

use crate::model::Submission;
use crate::storage::Store;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub submissions_added: usize,
    pub submissions_failed: usize,
    pub questions_inserted: usize,
    pub questions_existing: usize,
    pub questions_failed: usize,
}

/// Parses a JSON array of submissions.
pub fn parse_submissions(raw: &str) -> anyhow::Result<Vec<Submission>> {
    serde_json::from_str(raw).context("submission document must be a JSON array of submissions")
}

pub fn load_submissions(path: &Path) -> anyhow::Result<Vec<Submission>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read submissions {}", path.display()))?;
    parse_submissions(&raw)
}

/// Adds each submission on its own; one failure does not stop the others.
pub fn ingest(store: &Store, submissions: &[Submission]) -> IngestReport {
    let mut report = IngestReport::default();
    for s in submissions {
        match store.add_submission(s) {
            Ok(outcome) => {
                report.submissions_added += 1;
                report.questions_inserted += outcome.questions_inserted;
                report.questions_existing += outcome.questions_existing;
                report.questions_failed += outcome.questions_failed;
            }
            Err(e) => {
                tracing::error!(submission_id = %s.id, error = %e, "submission could not be added");
                report.submissions_failed += 1;
            }
        }
    }
    report
}
