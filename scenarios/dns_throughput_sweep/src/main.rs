use dnsfw_runner::prelude::*;

/// Sweeps the malicious domain share while `dnspyre` drives the resolver as hard as it can, and
/// captures the resolver's CPU usage for each share.
fn main() -> BenchResult<()> {
    let builder = BenchmarkDefinitionBuilder::new_with_init(Profile::ThroughputSweep);

    let summary = run(builder)?;
    log::info!(
        "Sweep completed, {}/{} runs succeeded",
        summary.successful_runs,
        summary.total_runs
    );

    Ok(())
}
