//! Schema and migrations. Each entry upgrades `PRAGMA user_version` by one.

use rusqlite::Connection;

pub const MIGRATIONS: &[&str] = &[
    // v1
    r#"
CREATE TABLE IF NOT EXISTS judges (
  name TEXT PRIMARY KEY NOT NULL,
  model TEXT NOT NULL,
  system_prompt TEXT NOT NULL,
  active INTEGER
);

CREATE TABLE IF NOT EXISTS questions (
  question_id TEXT PRIMARY KEY NOT NULL,
  submission_id TEXT NOT NULL,
  question_text TEXT NOT NULL,
  question_type TEXT NOT NULL,
  answer_json TEXT NOT NULL,
  judge_names_json TEXT
);

CREATE TABLE IF NOT EXISTS queues (
  queue_id TEXT NOT NULL,
  submission_id TEXT NOT NULL,
  PRIMARY KEY (queue_id, submission_id)
);

CREATE TABLE IF NOT EXISTS runs (
  run_id TEXT PRIMARY KEY NOT NULL,
  started INTEGER NOT NULL,
  snapshot_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id TEXT NOT NULL,
  queue_id TEXT NOT NULL,
  question_id TEXT NOT NULL,
  judge_json TEXT NOT NULL,
  verdict TEXT NOT NULL,
  reasoning TEXT,
  created INTEGER NOT NULL
);
"#,
    // v2
    r#"
CREATE INDEX IF NOT EXISTS idx_questions_submission ON questions(submission_id);
CREATE INDEX IF NOT EXISTS idx_evaluations_run ON evaluations(run_id);
"#,
];

pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |r| r.get(0))
}

/// Applies every migration newer than the database's recorded version.
pub fn migrate(conn: &Connection) -> rusqlite::Result<u32> {
    let current = schema_version(conn)? as usize;
    for (idx, ddl) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = idx + 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(ddl)?;
        tx.pragma_update(None, "user_version", version as u32)?;
        tx.commit()?;
        tracing::debug!(version, "applied schema migration");
    }
    schema_version(conn)
}
