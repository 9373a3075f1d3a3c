use crate::cli::BenchCli;
use crate::workload::Profile;

/// Initialise the CLI and logging for the benchmark runner.
///
/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init(profile: Profile) -> BenchCli {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    BenchCli::parse_for(profile)
}
