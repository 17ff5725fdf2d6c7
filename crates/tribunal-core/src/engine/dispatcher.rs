use crate::errors::EvalError;
use crate::judge::JudgeService;
use crate::model::{EvaluationReport, EvaluationRow, EvaluationUnit, Verdict};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Upper bound on concurrent judge invocations.
    pub max_in_flight: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// One row per unit that produced a verdict, in unit order.
    pub results: Vec<EvaluationRow>,
    pub report: EvaluationReport,
    /// Cancellation stopped the batch before every unit completed.
    pub cancelled: bool,
}

/// Fans a batch of units out to the judge invoker through a bounded pool.
///
/// The dispatcher never touches the store. A failing unit is counted in
/// `failed_req_count` and left out of `results`; it never aborts the batch.
#[derive(Clone)]
pub struct Dispatcher {
    judge: JudgeService,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(judge: JudgeService, policy: DispatchPolicy) -> Self {
        Self { judge, policy }
    }

    pub async fn run(&self, units: &[EvaluationUnit]) -> DispatchOutcome {
        self.run_with_cancel(units, &CancellationToken::new()).await
    }

    /// Units not yet started when `cancel` fires are skipped and not counted.
    /// Units in flight are abandoned and counted as failed.
    pub async fn run_with_cancel(
        &self,
        units: &[EvaluationUnit],
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let parallel = self.policy.max_in_flight.max(1);
        let sem = Arc::new(Semaphore::new(parallel));
        let mut report = EvaluationReport::default();
        let mut cancelled = false;
        let mut handles = Vec::with_capacity(units.len());

        for unit in units {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = sem.clone().acquire_owned() => permit,
            };
            report.total_req_count += 1;

            let Ok(permit) = permit else {
                warn!(question_id = %unit.question_id, judge = %unit.judge.name, "worker pool closed");
                report.failed_req_count += 1;
                continue;
            };

            let judge = self.judge.clone();
            let unit = unit.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let question = unit.judge_question();
                let res = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(EvalError::Cancelled),
                    res = judge.invoke(&unit.judge, &question) => res,
                };
                (unit, res)
            }));
        }

        // Single collection point: counters are only touched here.
        let mut results = Vec::with_capacity(handles.len());
        for h in handles {
            match h.await {
                Ok((unit, Ok((verdict, reasoning)))) => {
                    match verdict {
                        Verdict::Pass => report.pass_count += 1,
                        Verdict::Fail => report.fail_count += 1,
                        Verdict::Inconclusive => {}
                    }
                    results.push(EvaluationRow {
                        queue_id: unit.queue_id,
                        question_id: unit.question_id,
                        judge: unit.judge,
                        verdict,
                        reasoning,
                    });
                }
                Ok((unit, Err(e))) => {
                    cancelled |= matches!(e, EvalError::Cancelled);
                    warn!(
                        question_id = %unit.question_id,
                        judge = %unit.judge.name,
                        error = %e,
                        "evaluation unit failed"
                    );
                    report.failed_req_count += 1;
                }
                Err(e) => {
                    warn!(error = %e, "evaluation task aborted");
                    report.failed_req_count += 1;
                }
            }
        }

        info!(
            total = report.total_req_count,
            failed = report.failed_req_count,
            pass = report.pass_count,
            fail = report.fail_count,
            cancelled,
            "dispatch finished"
        );

        DispatchOutcome {
            results,
            report,
            cancelled,
        }
    }
}
