use dnsfw_runner::prelude::*;

fn main() -> BenchResult<()> {
    let builder = BenchmarkDefinitionBuilder::new_with_init(Profile::CpuUsage);

    run(builder)?;

    Ok(())
}
