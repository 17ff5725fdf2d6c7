use super::store::{parse_verdict, Store};
use crate::errors::EvalResult;
use crate::model::Judge;
use crate::stats::{JudgeMatching, PassStatistics};
use rusqlite::params;
use std::collections::HashSet;

impl Store {
    /// Counts for rows of `run_id` whose stored judge equals `judge` field for field.
    pub fn get_judge_verdict_statistics(&self, run_id: &str, judge: &Judge) -> EvalResult<PassStatistics> {
        self.get_judge_verdict_statistics_with(run_id, judge, JudgeMatching::ByValue)
    }

    pub fn get_judge_verdict_statistics_with(
        &self,
        run_id: &str,
        judge: &Judge,
        matching: JudgeMatching,
    ) -> EvalResult<PassStatistics> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT judge_json, verdict FROM evaluations WHERE run_id=?1")?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = PassStatistics::default();
        for (judge_json, verdict) in rows {
            let stored: Judge = serde_json::from_str(&judge_json)?;
            if matching.matches(&stored, judge) {
                stats.record(parse_verdict(&verdict)?);
            }
        }
        Ok(stats)
    }

    /// Counts over all judges; one run if given, otherwise every run ever recorded.
    pub fn get_row_pass_statistics(&self, run_id: Option<&str>) -> EvalResult<PassStatistics> {
        let conn = self.lock();
        let (total, pass, fail) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(verdict = 'pass'), 0),
                    COALESCE(SUM(verdict = 'fail'), 0)
             FROM evaluations
             WHERE ?1 IS NULL OR run_id = ?1",
            params![run_id],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
        )?;
        Ok(PassStatistics {
            total_evals: total as u64,
            pass_evals: pass as u64,
            fail_evals: fail as u64,
        })
    }

    /// Distinct judge snapshots with at least one row in the run, first seen first.
    /// Empty while the run is still in progress.
    pub fn get_judges_from_run(&self, run_id: &str) -> EvalResult<Vec<Judge>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT judge_json FROM evaluations WHERE run_id=?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![run_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let mut judges = Vec::new();
        for judge_json in rows {
            if seen.insert(judge_json.clone()) {
                judges.push(serde_json::from_str(&judge_json)?);
            }
        }
        Ok(judges)
    }
}
