use dnsfw_runner::prelude::*;

/// Sends a slow stream of queries and keeps `dnspyre`'s per-request log next to the CPU capture,
/// so latency can be compared between firewall configurations.
fn main() -> BenchResult<()> {
    let builder = BenchmarkDefinitionBuilder::new_with_init(Profile::QueryLatency);

    run(builder)?;

    Ok(())
}
