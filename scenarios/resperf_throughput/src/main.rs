use dnsfw_runner::prelude::*;

// resperf-report writes its own report, only the CPU capture is retrieved
fn main() -> BenchResult<()> {
    let builder = BenchmarkDefinitionBuilder::new_with_init(Profile::ResperfThroughput);

    run(builder)?;

    Ok(())
}
