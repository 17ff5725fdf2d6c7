use crate::engine::runner::RunOutcome;
use crate::stats::{format_rate, RunSummary};

pub fn print_run_summary(outcome: &RunOutcome) {
    let r = &outcome.report;
    if outcome.cancelled {
        eprintln!("CANCELLED [{}]: run stopped before all units completed", outcome.run_id);
    }
    if r.failed_req_count > 0 {
        eprintln!(
            "WARN [{}]: {} of {} judge calls failed",
            outcome.run_id, r.failed_req_count, r.total_req_count
        );
    }
    eprintln!(
        "Run {}: total={} failed={} pass={} fail={} inconclusive={} persisted={}",
        outcome.run_id,
        r.total_req_count,
        r.failed_req_count,
        r.pass_count,
        r.fail_count,
        r.inconclusive_count(),
        outcome.persisted
    );
}

pub fn print_run_statistics(summary: &RunSummary) {
    if summary.in_progress {
        eprintln!("Run {}: in progress (no evaluations yet)", summary.run_id);
        return;
    }
    eprintln!(
        "Run {}: {} evaluations, pass rate {}",
        summary.run_id,
        summary.overall.total_evals,
        format_rate(summary.pass_rate)
    );
    for j in &summary.judges {
        eprintln!(
            "  {} ({}): pass={} fail={} inconclusive={} rate={}",
            j.judge.name,
            j.judge.model,
            j.statistics.pass_evals,
            j.statistics.fail_evals,
            j.statistics.inconclusive_evals(),
            format_rate(j.pass_rate)
        );
    }
}
