use super::store::{now_millis, Store};
use crate::errors::{EvalError, EvalResult};
use crate::model::Judge;
use rusqlite::{params, Connection, OptionalExtension};

impl Store {
    pub fn add_judge(&self, judge: &Judge) -> EvalResult<()> {
        validate_judge(judge)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO judges(name, model, system_prompt, active) VALUES (?1, ?2, ?3, ?4)",
            params![judge.name, judge.model, judge.system_prompt, judge.active],
        )
        .map_err(|e| match EvalError::from(e) {
            EvalError::Constraint { .. } => EvalError::Constraint {
                message: format!("judge '{}' already exists", judge.name),
            },
            other => other,
        })?;
        Ok(())
    }

    /// Updates model, prompt and activation. The name is the identity and never changes.
    pub fn edit_judge(&self, old: &Judge, new: &Judge) -> EvalResult<()> {
        if old.name != new.name {
            return Err(EvalError::validation(format!(
                "judge names are immutable ('{}' -> '{}')",
                old.name, new.name
            )));
        }
        validate_judge(new)?;
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE judges SET model=?1, system_prompt=?2, active=?3 WHERE name=?4",
            params![new.model, new.system_prompt, new.active, old.name],
        )?;
        if changed == 0 {
            return Err(EvalError::not_found("judge", &old.name));
        }
        Ok(())
    }

    /// Stamps the judge active with the current time, or clears it. Returns the new value.
    pub fn set_judge_active(&self, judge: &Judge, activate: bool) -> EvalResult<Option<i64>> {
        let active = activate.then(now_millis);
        let updated = Judge {
            active,
            ..judge.clone()
        };
        self.edit_judge(judge, &updated)?;
        Ok(active)
    }

    /// Deletes by name. Returns whether a row was removed.
    pub fn remove_judge(&self, judge: &Judge) -> EvalResult<bool> {
        let conn = self.lock();
        let n = conn.execute("DELETE FROM judges WHERE name=?1", params![judge.name])?;
        Ok(n > 0)
    }

    pub fn get_judges(&self) -> EvalResult<Vec<Judge>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT name, model, system_prompt, active FROM judges ORDER BY rowid")?;
        let judges = stmt
            .query_map([], judge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(judges)
    }

    pub fn get_judge(&self, name: &str) -> EvalResult<Judge> {
        let conn = self.lock();
        find_judge(&conn, name)?.ok_or_else(|| EvalError::not_found("judge", name))
    }
}

pub(crate) fn find_judge(conn: &Connection, name: &str) -> rusqlite::Result<Option<Judge>> {
    conn.query_row(
        "SELECT name, model, system_prompt, active FROM judges WHERE name=?1",
        params![name],
        judge_from_row,
    )
    .optional()
}

fn judge_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Judge> {
    Ok(Judge {
        name: r.get(0)?,
        model: r.get(1)?,
        system_prompt: r.get(2)?,
        active: r.get(3)?,
    })
}

fn validate_judge(judge: &Judge) -> EvalResult<()> {
    if judge.name.trim().is_empty() {
        return Err(EvalError::validation("judge name must not be empty"));
    }
    if judge.model.trim().is_empty() {
        return Err(EvalError::validation(format!(
            "judge '{}' has no model",
            judge.name
        )));
    }
    Ok(())
}
