use serde::{Deserialize, Serialize};

/// A named LLM configuration used to grade answers.
///
/// Field order is significant: evaluation rows store the serialized judge and
/// statistics compare those snapshots, so serialization must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judge {
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    /// Activation time in unix milliseconds, `None` when inactive.
    pub active: Option<i64>,
}

impl Judge {
    pub fn new(name: impl Into<String>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Inconclusive => "inconclusive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(Verdict::Pass),
            "fail" => Some(Verdict::Fail),
            "inconclusive" => Some(Verdict::Inconclusive),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Ingestion shapes. `answers` and `question_type` are forwarded untouched.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub queue_id: String,
    #[serde(default)]
    pub labeling_task_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub rev: Option<u32>,
    pub data: QuestionData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub id: String,
    pub question_type: String,
    pub question_text: String,
}

/// What a judge is shown: the question and the submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeQuestion {
    pub question_text: String,
    pub answer: serde_json::Value,
}

/// One (question, judge) pair slated for invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationUnit {
    pub queue_id: String,
    pub submission_id: String,
    pub question_id: String,
    pub question_text: String,
    pub answer: serde_json::Value,
    pub judge: Judge,
}

impl EvaluationUnit {
    pub fn judge_question(&self) -> JudgeQuestion {
        JudgeQuestion {
            question_text: self.question_text.clone(),
            answer: self.answer.clone(),
        }
    }
}

/// Outcome of one completed unit, ready to be appended to the evaluation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRow {
    pub queue_id: String,
    pub question_id: String,
    pub judge: Judge,
    pub verdict: Verdict,
    pub reasoning: Option<String>,
}

/// Aggregate counters for one dispatched batch.
///
/// Inconclusive verdicts are not counted separately:
/// `total_req_count - failed_req_count - pass_count - fail_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub total_req_count: u64,
    pub failed_req_count: u64,
    pub pass_count: u64,
    pub fail_count: u64,
}

impl EvaluationReport {
    pub fn inconclusive_count(&self) -> u64 {
        self.total_req_count
            .saturating_sub(self.failed_req_count)
            .saturating_sub(self.pass_count)
            .saturating_sub(self.fail_count)
    }
}

/// One question of a queue with its live judge assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRow {
    pub queue_id: String,
    pub submission_id: String,
    pub question_id: String,
    pub question_text: String,
    pub question_type: String,
    pub answer: serde_json::Value,
    pub judges: Option<Vec<Judge>>,
}

/// Evaluation log entry joined with its question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsRow {
    pub run_id: String,
    pub queue_id: String,
    pub question_id: String,
    pub submission_id: String,
    pub question_text: String,
    pub question_type: String,
    pub answer: serde_json::Value,
    pub judge: Judge,
    pub verdict: Verdict,
    pub reasoning: Option<String>,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub started: i64,
    pub snapshot: Vec<EvaluationUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub reasoning: Option<String>,
    pub provider: String,
    pub model: String,
}
