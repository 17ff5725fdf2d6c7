use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tribunal",
    version,
    about = "Dispatch annotated answers to LLM judges and track their verdicts"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Clone)]
pub struct GlobalArgs {
    #[arg(long, global = true, default_value = "tribunal.yaml", env = "TRIBUNAL_CONFIG")]
    pub config: PathBuf,

    /// Database file (overrides database.path)
    #[arg(long, global = true, env = "DB_PATH")]
    pub db: Option<PathBuf>,

    /// LLM backend: openai|groq (overrides provider.backend)
    #[arg(long, global = true, env = "LLM_BACKEND")]
    pub backend: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample config (and optionally a sample submissions file)
    Init(InitArgs),
    /// List the models offered by the configured backend
    Models,
    #[command(subcommand)]
    Judge(JudgeSub),
    /// Load a JSON array of submissions
    Ingest(IngestArgs),
    /// Replace the judges assigned to a question
    Assign(AssignArgs),
    /// Show every queued question with its assigned judges
    Queue,
    /// Evaluate every assigned judge over a queue
    Run(RunArgs),
    /// Dump the evaluation log joined with question data
    Results,
    /// List run ids, newest first
    Runs,
    /// Pass-rate statistics for a run, or for all runs
    Stats(StatsArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    /// write sample-submissions.json next to the config
    #[arg(long)]
    pub sample: bool,

    /// generate .gitignore for the database
    #[arg(long)]
    pub gitignore: bool,
}

#[derive(Subcommand)]
pub enum JudgeSub {
    Add(JudgeFields),
    /// Replace a judge's model and prompt; the name cannot change
    Edit(JudgeFields),
    Activate {
        name: String,
    },
    Deactivate {
        name: String,
    },
    Remove {
        name: String,
    },
    List,
}

#[derive(Parser, Clone)]
pub struct JudgeFields {
    pub name: String,
    #[arg(long)]
    pub model: String,
    #[arg(long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct IngestArgs {
    pub file: PathBuf,
}

#[derive(Parser, Clone)]
pub struct AssignArgs {
    pub question_id: String,
    /// Judge names; omit to clear the assignment
    #[arg(long = "judge")]
    pub judges: Vec<String>,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    pub queue_id: String,

    /// defaults to a fresh UUID
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// exit 1 when any judge call failed
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Clone)]
pub struct StatsArgs {
    /// omit for totals across every run
    pub run_id: Option<String>,

    /// by_value|by_identity (overrides statistics.judge_matching)
    #[arg(long)]
    pub matching: Option<String>,
}
