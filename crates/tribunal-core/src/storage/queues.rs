use super::judges::find_judge;
use super::store::Store;
use crate::errors::{EvalError, EvalResult};
use crate::model::{EvaluationUnit, Judge, QueueRow, Submission};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;

/// Per-question outcome of ingesting one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub questions_inserted: usize,
    pub questions_existing: usize,
    pub questions_failed: usize,
}

impl Store {
    /// Idempotent: membership and questions already present are left untouched.
    ///
    /// Questions are written one at a time; a failing question is logged and
    /// skipped, the rest of the submission is still written.
    pub fn add_submission(&self, submission: &Submission) -> EvalResult<SubmissionOutcome> {
        if submission.id.trim().is_empty() || submission.queue_id.trim().is_empty() {
            return Err(EvalError::validation(
                "submission requires both id and queueId",
            ));
        }

        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO queues(queue_id, submission_id) VALUES (?1, ?2)",
            params![submission.queue_id, submission.id],
        )?;

        let mut outcome = SubmissionOutcome::default();
        for question in &submission.questions {
            let data = &question.data;
            let answer = submission
                .answers
                .get(&data.id)
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            let res = serde_json::to_string(&answer)
                .map_err(EvalError::from)
                .and_then(|answer_json| {
                    conn.execute(
                        "INSERT OR IGNORE INTO questions(
                            question_id, submission_id, question_text, question_type, answer_json, judge_names_json
                         ) VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
                        params![
                            data.id,
                            submission.id,
                            data.question_text,
                            data.question_type,
                            answer_json
                        ],
                    )
                    .map_err(EvalError::from)
                });

            match res {
                Ok(0) => outcome.questions_existing += 1,
                Ok(_) => outcome.questions_inserted += 1,
                Err(e) => {
                    tracing::warn!(
                        submission_id = %submission.id,
                        question_id = %data.id,
                        error = %e,
                        "question could not be stored"
                    );
                    outcome.questions_failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Replaces the question's whole assignment. An empty slice clears it.
    pub fn assign_judges_to_question(&self, question_id: &str, judges: &[Judge]) -> EvalResult<()> {
        let conn = self.lock();

        let exists = conn
            .query_row(
                "SELECT 1 FROM questions WHERE question_id=?1",
                params![question_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(EvalError::not_found("question", question_id));
        }

        let mut seen = HashSet::new();
        for judge in judges {
            if !seen.insert(judge.name.as_str()) {
                return Err(EvalError::validation(format!(
                    "judge '{}' assigned twice to question '{}'",
                    judge.name, question_id
                )));
            }
            if find_judge(&conn, &judge.name)?.is_none() {
                return Err(EvalError::validation(format!(
                    "cannot assign unknown judge '{}'",
                    judge.name
                )));
            }
        }

        let names: Vec<&str> = judges.iter().map(|j| j.name.as_str()).collect();
        conn.execute(
            "UPDATE questions SET judge_names_json=?1 WHERE question_id=?2",
            params![serde_json::to_string(&names)?, question_id],
        )?;
        Ok(())
    }

    /// One row per queued question with the judges currently assigned, resolved live.
    pub fn get_queue_data(&self) -> EvalResult<Vec<QueueRow>> {
        let conn = self.lock();
        let raw = queued_questions(&conn, None)?;

        raw.into_iter()
            .map(|q| {
                let judges = match &q.judge_names_json {
                    Some(names) => Some(resolve_judges(&conn, names)?),
                    None => None,
                };
                Ok(QueueRow {
                    queue_id: q.queue_id,
                    submission_id: q.submission_id,
                    question_id: q.question_id,
                    question_text: q.question_text,
                    question_type: q.question_type,
                    answer: serde_json::from_str(&q.answer_json)?,
                    judges,
                })
            })
            .collect()
    }

    /// Expands every assigned judge of every question in the queue into a unit.
    pub fn get_evaluation_data(&self, queue_id: &str) -> EvalResult<Vec<EvaluationUnit>> {
        let conn = self.lock();
        let raw = queued_questions(&conn, Some(queue_id))?;

        let mut units = Vec::new();
        for q in raw {
            let Some(names) = &q.judge_names_json else {
                continue;
            };
            let answer: serde_json::Value = serde_json::from_str(&q.answer_json)?;
            for judge in resolve_judges(&conn, names)? {
                units.push(EvaluationUnit {
                    queue_id: q.queue_id.clone(),
                    submission_id: q.submission_id.clone(),
                    question_id: q.question_id.clone(),
                    question_text: q.question_text.clone(),
                    answer: answer.clone(),
                    judge,
                });
            }
        }
        Ok(units)
    }
}

struct QueuedQuestion {
    queue_id: String,
    submission_id: String,
    question_id: String,
    question_text: String,
    question_type: String,
    answer_json: String,
    judge_names_json: Option<String>,
}

fn queued_questions(conn: &Connection, queue_id: Option<&str>) -> EvalResult<Vec<QueuedQuestion>> {
    let mut stmt = conn.prepare(
        "SELECT qu.queue_id, q.submission_id, q.question_id, q.question_text, q.question_type,
                q.answer_json, q.judge_names_json
         FROM queues qu
         INNER JOIN questions q ON q.submission_id = qu.submission_id
         WHERE ?1 IS NULL OR qu.queue_id = ?1
         ORDER BY qu.queue_id, q.rowid",
    )?;
    let rows = stmt
        .query_map(params![queue_id], |r| {
            Ok(QueuedQuestion {
                queue_id: r.get(0)?,
                submission_id: r.get(1)?,
                question_id: r.get(2)?,
                question_text: r.get(3)?,
                question_type: r.get(4)?,
                answer_json: r.get(5)?,
                judge_names_json: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn resolve_judges(conn: &Connection, names_json: &str) -> EvalResult<Vec<Judge>> {
    let names: Vec<String> = serde_json::from_str(names_json)?;
    names
        .iter()
        .map(|name| find_judge(conn, name)?.ok_or_else(|| EvalError::not_found("judge", name)))
        .collect()
}
