use crate::errors::{EvalError, EvalResult};
use crate::model::{EvaluationRow, EvaluationUnit, ResultsRow, RunRecord, Verdict};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle to the evaluation database. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> EvalResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> EvalResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs pending migrations and returns the resulting schema version.
    pub fn init_schema(&self) -> EvalResult<u32> {
        let conn = self.lock();
        Ok(crate::storage::schema::migrate(&conn)?)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied statement behind.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // runs
    pub fn add_run(&self, run_id: &str, snapshot: &[EvaluationUnit]) -> EvalResult<i64> {
        if run_id.trim().is_empty() {
            return Err(EvalError::validation("run id must not be empty"));
        }
        tracing::info!(run_id, units = snapshot.len(), "preparing run");
        let started = now_millis();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO runs(run_id, started, snapshot_json) VALUES (?1, ?2, ?3)",
            params![run_id, started, serde_json::to_string(snapshot)?],
        )?;
        Ok(started)
    }

    pub fn get_run(&self, run_id: &str) -> EvalResult<RunRecord> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT started, snapshot_json FROM runs WHERE run_id=?1",
                params![run_id],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        let (started, snapshot_json) = row.ok_or_else(|| EvalError::not_found("run", run_id))?;
        Ok(RunRecord {
            run_id: run_id.to_string(),
            started,
            snapshot: serde_json::from_str(&snapshot_json)?,
        })
    }

    /// Run ids, most recently started first.
    pub fn get_run_ids(&self) -> EvalResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT run_id FROM runs ORDER BY started DESC, rowid DESC")?;
        let ids = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // evaluations
    /// Appends one row to the log of an existing run.
    pub fn add_evaluation(&self, run_id: &str, row: &EvaluationRow) -> EvalResult<i64> {
        let created = now_millis();
        let conn = self.lock();
        let known = conn
            .query_row("SELECT 1 FROM runs WHERE run_id=?1", params![run_id], |_| Ok(()))
            .optional()?;
        if known.is_none() {
            return Err(EvalError::not_found("run", run_id));
        }
        conn.execute(
            "INSERT INTO evaluations(run_id, queue_id, question_id, judge_json, verdict, reasoning, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                row.queue_id,
                row.question_id,
                serde_json::to_string(&row.judge)?,
                row.verdict.as_str(),
                row.reasoning,
                created,
            ],
        )?;
        Ok(created)
    }

    /// The full evaluation log joined with question metadata.
    pub fn get_results(&self) -> EvalResult<Vec<ResultsRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT e.run_id, e.queue_id, e.question_id, q.submission_id, q.question_text,
                    q.question_type, q.answer_json, e.judge_json, e.verdict, e.reasoning, e.created
             FROM evaluations e
             INNER JOIN questions q ON q.question_id = e.question_id
             ORDER BY e.id",
        )?;
        let raw = stmt
            .query_map([], |r| {
                Ok((
                    (
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                    ),
                    (
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                    ),
                    (
                        r.get::<_, String>(8)?,
                        r.get::<_, Option<String>>(9)?,
                        r.get::<_, i64>(10)?,
                    ),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(
                |(
                    (run_id, queue_id, question_id, submission_id),
                    (question_text, question_type, answer_json, judge_json),
                    (verdict, reasoning, created),
                )| {
                    Ok(ResultsRow {
                        run_id,
                        queue_id,
                        question_id,
                        submission_id,
                        question_text,
                        question_type,
                        answer: serde_json::from_str(&answer_json)?,
                        judge: serde_json::from_str(&judge_json)?,
                        verdict: parse_verdict(&verdict)?,
                        reasoning,
                        created,
                    })
                },
            )
            .collect()
    }
}

pub(crate) fn parse_verdict(s: &str) -> EvalResult<Verdict> {
    Verdict::parse(s).ok_or_else(|| EvalError::validation(format!("unknown verdict in store: {s}")))
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
