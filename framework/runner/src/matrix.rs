use std::time::Duration;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::orchestrator::RunOutcome;
use crate::params::{ExperimentParameters, MaliciousPercent};

/// The totals of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub total_runs: usize,
    pub successful_runs: usize,
    /// The percentages of the failed runs, in the order they ran. `None` for a profile without
    /// percentages.
    pub failed_parameter_values: Vec<Option<MaliciousPercent>>,
}

impl SweepSummary {
    pub fn from_outcomes(outcomes: &[RunOutcome]) -> Self {
        outcomes.iter().fold(
            SweepSummary {
                total_runs: 0,
                successful_runs: 0,
                failed_parameter_values: Vec::new(),
            },
            |mut summary, outcome| {
                summary.total_runs += 1;
                if outcome.succeeded {
                    summary.successful_runs += 1;
                } else {
                    summary
                        .failed_parameter_values
                        .push(outcome.parameters.malicious_percent);
                }
                summary
            },
        )
    }

    pub fn all_succeeded(&self) -> bool {
        self.successful_runs == self.total_runs
    }
}

#[derive(Tabled)]
struct SweepRow {
    #[tabled(rename = "Run")]
    run: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Failed at")]
    failed_at: String,
    #[tabled(rename = "Diagnostics")]
    diagnostics: usize,
    #[tabled(rename = "Duration (s)")]
    duration_s: String,
}

/// A table of every run, one row per run.
pub fn summary_table(outcomes: &[RunOutcome]) -> String {
    let rows = outcomes
        .iter()
        .map(|outcome| SweepRow {
            run: outcome.parameters.label(),
            result: if outcome.succeeded { "ok" } else { "FAILED" }.to_string(),
            failed_at: outcome
                .failure_stage
                .map(|stage| stage.to_string())
                .unwrap_or_default(),
            diagnostics: outcome.diagnostics.len(),
            duration_s: format!("{:.1}", outcome.duration.as_secs_f64()),
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

/// Run every parameter set in order, never retrying and never stopping early.
///
/// `wait` is slept between two runs so the remote service settles, but not after the last one.
pub fn run_sweep<F>(runs: &[ExperimentParameters], wait: Duration, mut run_one: F) -> SweepSummary
where
    F: FnMut(&ExperimentParameters) -> RunOutcome,
{
    let mut outcomes = Vec::with_capacity(runs.len());

    if let Some(first) = runs.first() {
        log::info!(
            "Starting {} run(s) of {} for {}",
            runs.len(),
            first.profile,
            first.test_type
        );
    }

    for (index, parameters) in runs.iter().enumerate() {
        log::info!(
            "Starting run {}/{} for {}",
            index + 1,
            runs.len(),
            parameters.label()
        );

        let outcome = run_one(parameters);
        if outcome.succeeded {
            log::info!(
                "Completed run for {} in {:.1}s",
                parameters.label(),
                outcome.duration.as_secs_f64()
            );
        } else {
            log::error!(
                "Run for {} failed at {}",
                parameters.label(),
                outcome
                    .failure_stage
                    .map(|stage| stage.to_string())
                    .unwrap_or_default()
            );
        }
        outcomes.push(outcome);

        if index + 1 < runs.len() && !wait.is_zero() {
            log::info!("Waiting {}s before starting the next run...", wait.as_secs());
            std::thread::sleep(wait);
        }
    }

    let summary = SweepSummary::from_outcomes(&outcomes);

    println!("\nSummary of runs");
    println!("{}", summary_table(&outcomes));
    log::info!(
        "Successful runs: {}/{}",
        summary.successful_runs,
        summary.total_runs
    );
    if !summary.failed_parameter_values.is_empty() {
        log::warn!(
            "Failed runs for percentages: {}",
            summary
                .failed_parameter_values
                .iter()
                .map(|p| p.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    summary
}
