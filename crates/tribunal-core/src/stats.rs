//! Pass-rate statistics derived from the evaluation log.

use crate::errors::EvalResult;
use crate::model::{Judge, Verdict};
use crate::storage::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassStatistics {
    pub total_evals: u64,
    pub pass_evals: u64,
    pub fail_evals: u64,
}

impl PassStatistics {
    pub fn record(&mut self, verdict: Verdict) {
        self.total_evals += 1;
        match verdict {
            Verdict::Pass => self.pass_evals += 1,
            Verdict::Fail => self.fail_evals += 1,
            Verdict::Inconclusive => {}
        }
    }

    pub fn inconclusive_evals(&self) -> u64 {
        self.total_evals
            .saturating_sub(self.pass_evals)
            .saturating_sub(self.fail_evals)
    }

    /// `None` when nothing was evaluated.
    pub fn pass_rate(&self) -> Option<f64> {
        (self.total_evals > 0).then(|| self.pass_evals as f64 / self.total_evals as f64)
    }

    pub fn fail_rate(&self) -> Option<f64> {
        (self.total_evals > 0).then(|| self.fail_evals as f64 / self.total_evals as f64)
    }
}

/// How a judge passed to a statistics query is matched against stored snapshots.
///
/// `ByValue` compares every field, so a judge edited after a run no longer
/// matches its own historical rows. `ByIdentity` compares the name and the
/// activation timestamp only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeMatching {
    #[default]
    ByValue,
    ByIdentity,
}

impl JudgeMatching {
    pub fn matches(&self, stored: &Judge, probe: &Judge) -> bool {
        match self {
            JudgeMatching::ByValue => stored == probe,
            JudgeMatching::ByIdentity => stored.name == probe.name && stored.active == probe.active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeSummary {
    pub judge: Judge,
    pub statistics: PassStatistics,
    pub pass_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started: i64,
    /// No evaluation rows yet.
    pub in_progress: bool,
    pub overall: PassStatistics,
    pub pass_rate: Option<f64>,
    pub judges: Vec<JudgeSummary>,
}

/// Overall and per-judge statistics for one run.
pub fn run_summary(store: &Store, run_id: &str, matching: JudgeMatching) -> EvalResult<RunSummary> {
    let run = store.get_run(run_id)?;
    let overall = store.get_row_pass_statistics(Some(run_id))?;

    let mut judges = Vec::new();
    for judge in store.get_judges_from_run(run_id)? {
        let statistics = store.get_judge_verdict_statistics_with(run_id, &judge, matching)?;
        judges.push(JudgeSummary {
            pass_rate: statistics.pass_rate(),
            judge,
            statistics,
        });
    }

    Ok(RunSummary {
        run_id: run.run_id,
        started: run.started,
        in_progress: overall.total_evals == 0,
        pass_rate: overall.pass_rate(),
        overall,
        judges,
    })
}

/// Formats a rate for display; unavailable when there is nothing to divide.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_rate_is_undefined_without_evals() {
        let s = PassStatistics::default();
        assert_eq!(s.pass_rate(), None);
        assert_eq!(format_rate(s.pass_rate()), "n/a");
    }

    #[test]
    fn record_counts_inconclusive_only_in_total() {
        let mut s = PassStatistics::default();
        for v in [Verdict::Pass, Verdict::Fail, Verdict::Inconclusive, Verdict::Pass] {
            s.record(v);
        }
        assert_eq!(s, PassStatistics { total_evals: 4, pass_evals: 2, fail_evals: 1 });
        assert_eq!(s.inconclusive_evals(), 1);
        assert_eq!(s.pass_rate(), Some(0.5));
        assert_eq!(format_rate(s.fail_rate()), "25.0%");
    }

    #[test]
    fn identity_matching_ignores_prompt_edits() {
        let stored = Judge {
            active: Some(10),
            ..Judge::new("strict", "gpt-4o", "v1 prompt")
        };
        let edited = Judge {
            system_prompt: "v2 prompt".into(),
            ..stored.clone()
        };
        assert!(!JudgeMatching::ByValue.matches(&stored, &edited));
        assert!(JudgeMatching::ByIdentity.matches(&stored, &edited));
        assert!(JudgeMatching::ByValue.matches(&stored, &stored.clone()));
    }
}
