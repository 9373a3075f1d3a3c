use anyhow::bail;
use dnsfw_remote::{Connect, SshConnector};

use crate::definition::BenchmarkDefinitionBuilder;
use crate::matrix::{run_sweep, SweepSummary};
use crate::orchestrator::Orchestrator;
use crate::process::{LocalProcessRunner, ProcessRunner};
use crate::types::BenchResult;

/// Run the benchmark against the remote host over SSH.
///
/// Returns an error if any run failed, so that the binary exits with a failure status.
pub fn run(definition: BenchmarkDefinitionBuilder) -> BenchResult<SweepSummary> {
    let summary = run_with(definition, &SshConnector, &LocalProcessRunner)?;

    if !summary.all_succeeded() {
        bail!(
            "{} of {} runs failed",
            summary.total_runs - summary.successful_runs,
            summary.total_runs
        );
    }

    Ok(summary)
}

/// Run the benchmark with the given connector and local process runner.
pub fn run_with<C: Connect, P: ProcessRunner>(
    definition: BenchmarkDefinitionBuilder,
    connector: &C,
    processes: &P,
) -> BenchResult<SweepSummary> {
    let definition = definition.build()?;

    log::info!("Running benchmark: {}", definition.profile);

    let orchestrator = Orchestrator::new(connector, processes, definition.options);

    Ok(run_sweep(
        &definition.runs,
        definition.wait_between_runs,
        |parameters| orchestrator.execute(parameters),
    ))
}
