use super::dispatcher::Dispatcher;
use crate::errors::{EvalError, EvalResult};
use crate::model::EvaluationReport;
use crate::storage::Store;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: String,
    pub run_timestamp: i64,
    pub report: EvaluationReport,
    /// Evaluation rows actually written.
    pub persisted: usize,
    pub cancelled: bool,
}

/// Resolves a queue into units, snapshots them as a run, dispatches and
/// appends the completed rows to the evaluation log.
#[derive(Clone)]
pub struct Runner {
    pub store: Store,
    pub dispatcher: Dispatcher,
}

impl Runner {
    pub fn new(store: Store, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn run_queue(
        &self,
        queue_id: &str,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> EvalResult<RunOutcome> {
        if queue_id.trim().is_empty() {
            return Err(EvalError::validation("queue id must not be empty"));
        }

        let units = self.store.get_evaluation_data(queue_id)?;
        let run_timestamp = self.store.add_run(run_id, &units)?;
        info!(run_id, queue_id, units = units.len(), "run started");

        let outcome = self.dispatcher.run_with_cancel(&units, cancel).await;

        let mut persisted = 0;
        for row in &outcome.results {
            match self.store.add_evaluation(run_id, row) {
                Ok(_) => persisted += 1,
                Err(e) => warn!(
                    run_id,
                    question_id = %row.question_id,
                    judge = %row.judge.name,
                    error = %e,
                    "evaluation row could not be persisted"
                ),
            }
        }

        Ok(RunOutcome {
            run_id: run_id.to_string(),
            run_timestamp,
            report: outcome.report,
            persisted,
            cancelled: outcome.cancelled,
        })
    }
}
