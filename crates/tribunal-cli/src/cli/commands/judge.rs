use super::{exit_codes, load_config, open_store, print_json};
use crate::cli::args::{GlobalArgs, JudgeFields, JudgeSub};
use tribunal_core::errors::EvalError;
use tribunal_core::model::Judge;
use tribunal_core::storage::Store;

pub fn cmd_judge(global: &GlobalArgs, sub: JudgeSub) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;

    match sub {
        JudgeSub::Add(fields) => {
            let judge = Judge::new(fields.name.clone(), fields.model.clone(), system_prompt(&fields)?);
            warn_unlisted_model(&cfg.available_models(), &judge.model);
            store.add_judge(&judge)?;
            eprintln!("judge added: {}", judge.name);
            print_json(&judge)?;
        }
        JudgeSub::Edit(fields) => {
            let old = store.get_judge(&fields.name)?;
            let new = Judge {
                model: fields.model.clone(),
                system_prompt: system_prompt(&fields)?,
                ..old.clone()
            };
            warn_unlisted_model(&cfg.available_models(), &new.model);
            store.edit_judge(&old, &new)?;
            eprintln!("judge updated: {}", new.name);
            print_json(&new)?;
        }
        JudgeSub::Activate { name } => set_active(&store, &name, true)?,
        JudgeSub::Deactivate { name } => set_active(&store, &name, false)?,
        JudgeSub::Remove { name } => {
            let removed = match store.get_judge(&name) {
                Ok(judge) => store.remove_judge(&judge)?,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e.into()),
            };
            if removed {
                eprintln!("judge removed: {name}");
            } else {
                eprintln!("note: no judge named {name}");
            }
            print_json(&serde_json::json!({ "name": name, "removed": removed }))?;
        }
        JudgeSub::List => print_json(&store.get_judges()?)?,
    }
    Ok(exit_codes::OK)
}

fn set_active(store: &Store, name: &str, activate: bool) -> anyhow::Result<()> {
    let judge = store.get_judge(name)?;
    let active = store.set_judge_active(&judge, activate)?;
    print_json(&Judge { active, ..judge })?;
    Ok(())
}

fn system_prompt(fields: &JudgeFields) -> anyhow::Result<String> {
    match (&fields.prompt, &fields.prompt_file) {
        (Some(p), _) => Ok(p.clone()),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
        (None, None) => Err(EvalError::validation("either --prompt or --prompt-file is required").into()),
    }
}

fn warn_unlisted_model(models: &[String], model: &str) {
    if !models.iter().any(|m| m == model) {
        tracing::warn!(model, "model is not in the backend's model list");
    }
}
