use super::args::*;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tribunal_core::config::TribunalConfig;
use tribunal_core::errors::{ConfigError, EvalError};
use tribunal_core::providers::llm::{openai::OpenAIClient, Backend, LlmClient};
use tribunal_core::stats::JudgeMatching;
use tribunal_core::storage::Store;

pub mod judge;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    let res = match cli.cmd {
        Command::Init(args) => cmd_init(&global, args),
        Command::Models => cmd_models(&global),
        Command::Judge(sub) => judge::cmd_judge(&global, sub),
        Command::Ingest(args) => cmd_ingest(&global, args),
        Command::Assign(args) => cmd_assign(&global, args),
        Command::Queue => cmd_queue(&global),
        Command::Run(args) => cmd_run(&global, args).await,
        Command::Results => cmd_results(&global),
        Command::Runs => cmd_runs(&global),
        Command::Stats(args) => cmd_stats(&global, args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    };
    Ok(res.unwrap_or_else(classify_error))
}

/// Only configuration problems exit with `CONFIG_ERROR`; every other failure
/// is an operation failure.
fn classify_error(e: anyhow::Error) -> i32 {
    if let Some(cfg) = e.downcast_ref::<ConfigError>() {
        eprintln!("{cfg}");
        return exit_codes::CONFIG_ERROR;
    }
    if let Some(eval) = e.downcast_ref::<EvalError>() {
        eprintln!("error: {eval}");
    } else {
        eprintln!("error: {e:#}");
    }
    exit_codes::FAILED
}

fn cmd_init(global: &GlobalArgs, args: InitArgs) -> anyhow::Result<i32> {
    write_sample_config_if_missing(&global.config)?;

    if args.sample {
        let path = global
            .config
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("sample-submissions.json");
        write_file_if_missing(&path, crate::templates::SAMPLE_SUBMISSIONS_JSON)?;
    }

    if args.gitignore {
        write_file_if_missing(Path::new(".gitignore"), crate::templates::GITIGNORE)?;
    }

    Ok(exit_codes::OK)
}

fn cmd_models(global: &GlobalArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    print_json(&serde_json::json!({
        "backend": cfg.provider.backend.as_str(),
        "models": cfg.available_models(),
    }))?;
    Ok(exit_codes::OK)
}

fn cmd_ingest(global: &GlobalArgs, args: IngestArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;
    let submissions = tribunal_core::ingest::load_submissions(&args.file)?;
    let report = tribunal_core::ingest::ingest(&store, &submissions);

    eprintln!(
        "ingested {} submission(s) from {}: {} new question(s), {} already present",
        report.submissions_added,
        args.file.display(),
        report.questions_inserted,
        report.questions_existing
    );
    print_json(&report)?;

    if report.submissions_failed > 0 || report.questions_failed > 0 {
        return Ok(exit_codes::FAILED);
    }
    Ok(exit_codes::OK)
}

fn cmd_assign(global: &GlobalArgs, args: AssignArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;
    let judges = args
        .judges
        .iter()
        .map(|name| store.get_judge(name))
        .collect::<Result<Vec<_>, _>>()?;
    store.assign_judges_to_question(&args.question_id, &judges)?;

    eprintln!(
        "assigned {} judge(s) to question {}",
        judges.len(),
        args.question_id
    );
    Ok(exit_codes::OK)
}

fn cmd_queue(global: &GlobalArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;
    print_json(&store.get_queue_data()?)?;
    Ok(exit_codes::OK)
}

async fn cmd_run(global: &GlobalArgs, args: RunArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;
    let client = build_client(&cfg)?;

    let mut dispatch_policy = cfg.dispatch_policy();
    if let Some(n) = args.max_in_flight {
        if n == 0 {
            return Err(ConfigError("--max-in-flight must be at least 1".into()).into());
        }
        dispatch_policy.max_in_flight = n;
    }

    let judge = tribunal_core::judge::JudgeService::new(client, cfg.invoke_policy());
    let runner = tribunal_core::engine::runner::Runner::new(
        store,
        tribunal_core::engine::dispatcher::Dispatcher::new(judge, dispatch_policy),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt: cancelling run, completed evaluations are kept");
            trigger.cancel();
        }
    });

    let run_id = args
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let outcome = runner.run_queue(&args.queue_id, &run_id, &cancel).await?;

    print_json(&outcome)?;
    tribunal_core::report::console::print_run_summary(&outcome);

    if outcome.cancelled || (args.strict && outcome.report.failed_req_count > 0) {
        return Ok(exit_codes::FAILED);
    }
    Ok(exit_codes::OK)
}

fn cmd_results(global: &GlobalArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;
    print_json(&store.get_results()?)?;
    Ok(exit_codes::OK)
}

fn cmd_runs(global: &GlobalArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;
    print_json(&store.get_run_ids()?)?;
    Ok(exit_codes::OK)
}

fn cmd_stats(global: &GlobalArgs, args: StatsArgs) -> anyhow::Result<i32> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg)?;

    let Some(run_id) = args.run_id else {
        let all = store.get_row_pass_statistics(None)?;
        eprintln!(
            "all runs: {} evaluations, pass rate {}",
            all.total_evals,
            tribunal_core::stats::format_rate(all.pass_rate())
        );
        print_json(&all)?;
        return Ok(exit_codes::OK);
    };

    let matching = match args.matching.as_deref() {
        Some(s) => parse_matching(s)?,
        None => cfg.statistics.judge_matching,
    };
    let summary = tribunal_core::stats::run_summary(&store, &run_id, matching)?;
    tribunal_core::report::console::print_run_statistics(&summary);
    print_json(&summary)?;
    Ok(exit_codes::OK)
}

/// Config file plus command-line and environment overrides.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<TribunalConfig, ConfigError> {
    let mut cfg = tribunal_core::config::load_or_default(&global.config)?;
    if let Some(db) = &global.db {
        cfg.database.path = Some(db.clone());
    }
    if let Some(name) = &global.backend {
        cfg.provider.backend = Backend::parse(name)
            .ok_or_else(|| ConfigError(format!("unknown LLM backend '{name}' (openai|groq)")))?;
    }
    Ok(cfg)
}

pub(crate) fn open_store(cfg: &TribunalConfig) -> anyhow::Result<Store> {
    let path = cfg.db_path();
    ensure_parent_dir(&path)?;
    let store = Store::open(&path)?;
    let version = store.init_schema()?;
    tracing::debug!(db = %path.display(), schema_version = version, "store ready");
    Ok(store)
}

fn build_client(cfg: &TribunalConfig) -> Result<Arc<dyn LlmClient>, ConfigError> {
    let key_env = cfg.api_key_env();
    let api_key = std::env::var(&key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ConfigError(format!(
                "{} backend needs an API key in ${}",
                cfg.provider.backend.as_str(),
                key_env
            ))
        })?;

    let mut client = OpenAIClient::new(cfg.provider.backend, api_key)
        .with_sampling(cfg.provider.temperature, cfg.provider.max_tokens);
    if let Some(url) = &cfg.provider.base_url {
        client = client.with_base_url(url.clone());
    }
    Ok(Arc::new(client))
}

fn parse_matching(s: &str) -> Result<JudgeMatching, ConfigError> {
    match s.trim() {
        "by_value" => Ok(JudgeMatching::ByValue),
        "by_identity" => Ok(JudgeMatching::ByIdentity),
        other => Err(ConfigError(format!(
            "unknown judge matching '{other}' (by_value|by_identity)"
        ))),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_file_if_missing(path: &Path, content: &str) -> anyhow::Result<()> {
    ensure_parent_dir(path)?;
    if !path.exists() {
        std::fs::write(path, content)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists (skipped)", path.display());
    }
    Ok(())
}

fn write_sample_config_if_missing(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        ensure_parent_dir(path)?;
        tribunal_core::config::write_sample_config(path)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists", path.display());
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
