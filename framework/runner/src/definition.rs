use std::time::Duration;

use anyhow::bail;

use crate::cli::BenchCli;
use crate::config::BenchConfig;
use crate::init::init;
use crate::orchestrator::{OutcomePolicy, RunOptions};
use crate::params::ExperimentParameters;
use crate::types::BenchResult;
use crate::workload::Profile;

/// The builder for a benchmark definition.
///
/// This must be used at the start of a benchmark binary to define the profile that you want to
/// run.
pub struct BenchmarkDefinitionBuilder {
    /// The workload profile, which fixes the command line the binary accepts.
    profile: Profile,
    /// This value is initialised for you from the command line.
    cli: BenchCli,
}

/// A validated benchmark, ready to run.
pub struct BenchmarkDefinition {
    pub profile: Profile,
    /// One entry per run, in the order they are executed.
    pub runs: Vec<ExperimentParameters>,
    pub wait_between_runs: Duration,
    pub options: RunOptions,
}

impl BenchmarkDefinitionBuilder {
    /// Initialise a new benchmark definition from the profile and command line arguments.
    ///
    /// This also initialises logging.
    pub fn new_with_init(profile: Profile) -> Self {
        let cli = init(profile);
        Self::new(profile, cli)
    }

    /// Initialise a new benchmark definition from an already parsed command line.
    pub fn new(profile: Profile, cli: BenchCli) -> Self {
        Self { profile, cli }
    }

    pub fn build(self) -> BenchResult<BenchmarkDefinition> {
        let config = BenchConfig::from_args(&self.cli.common)?;

        let percents = self.cli.percents.runs();
        if percents.is_empty() {
            bail!("No malicious percentage selected for the {} benchmark", self.profile);
        }
        if self.profile.requires_percent() && percents.iter().any(Option::is_none) {
            bail!("The {} benchmark needs a malicious percentage", self.profile);
        }

        let target = config.host_target()?;
        let mut runs = Vec::with_capacity(percents.len());
        for malicious_percent in percents {
            let workload = self
                .profile
                .workload(self.cli.test_type, malicious_percent, &config);
            let elevation_secret = if workload.elevate_with_password {
                Some(config.elevation_secret()?)
            } else {
                None
            };

            runs.push(ExperimentParameters {
                profile: self.profile,
                test_type: self.cli.test_type,
                malicious_percent,
                target: target.clone(),
                elevation_secret,
                workload,
                timing: config.timing.settle_timings(),
                capture_interval_secs: config.capture.interval_secs,
                remote_dir: config.capture.remote_dir.clone(),
                results_root: config.results_root.clone(),
            });
        }

        let outcome_policy = if self.cli.common.strict {
            OutcomePolicy::RequireArtifacts
        } else {
            OutcomePolicy::Lenient
        };

        Ok(BenchmarkDefinition {
            profile: self.profile,
            runs,
            wait_between_runs: Duration::from_secs(
                self.cli
                    .wait_time
                    .unwrap_or(config.timing.wait_between_runs_secs),
            ),
            options: RunOptions {
                outcome_policy,
                settle_mode: config.timing.settle_mode,
                verify: config.timing.verify_policy(),
                show_progress: !self.cli.common.no_progress,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use dnsfw_summary_model::TestType;

    use super::*;
    use crate::cli::{CommonArgs, PercentSelection};
    use crate::orchestrator::SettleMode;
    use crate::params::MaliciousPercent;

    fn cli(percents: PercentSelection, common: CommonArgs) -> BenchCli {
        BenchCli {
            test_type: TestType::PolicyFilter,
            percents,
            wait_time: None,
            common,
        }
    }

    fn with_password() -> CommonArgs {
        CommonArgs {
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn builds_one_run_per_percent() {
        let percents = PercentSelection::of(vec![
            MaliciousPercent::new(20).unwrap(),
            MaliciousPercent::new(10).unwrap(),
        ]);
        let definition = BenchmarkDefinitionBuilder::new(
            Profile::ThroughputSweep,
            cli(percents, with_password()),
        )
        .build()
        .unwrap();

        assert_eq!(
            definition
                .runs
                .iter()
                .map(|r| r.malicious_percent.unwrap().get())
                .collect::<Vec<_>>(),
            vec![10, 20]
        );
        assert!(definition.runs[0].elevation_secret.is_some());
        assert_eq!(definition.wait_between_runs, Duration::from_secs(10));
        assert_eq!(definition.options.outcome_policy, OutcomePolicy::Lenient);
        assert_eq!(definition.options.settle_mode, SettleMode::Fixed);
    }

    #[test]
    fn requires_percent_for_throughput() {
        let result = BenchmarkDefinitionBuilder::new(
            Profile::CpuUsage,
            cli(PercentSelection::Unused, with_password()),
        )
        .build();

        assert!(result.is_err());
    }

    #[test]
    fn requires_password_when_elevating_with_one() {
        let common = CommonArgs {
            key_file: Some("/home/user/.ssh/id_ed25519".into()),
            ..Default::default()
        };

        assert!(BenchmarkDefinitionBuilder::new(
            Profile::ResperfThroughput,
            cli(PercentSelection::Unused, common.clone()),
        )
        .build()
        .is_err());

        let percents = PercentSelection::of(vec![MaliciousPercent::new(10).unwrap()]);
        let definition =
            BenchmarkDefinitionBuilder::new(Profile::CpuUsage, cli(percents, common))
                .build()
                .unwrap();
        assert!(definition.runs[0].elevation_secret.is_none());
    }

    #[test]
    fn strict_requires_artifacts() {
        let common = CommonArgs {
            strict: true,
            no_progress: true,
            ..with_password()
        };
        let definition = BenchmarkDefinitionBuilder::new(
            Profile::QueryLatency,
            cli(PercentSelection::Unused, common),
        )
        .build()
        .unwrap();

        assert_eq!(definition.runs.len(), 1);
        assert_eq!(
            definition.options.outcome_policy,
            OutcomePolicy::RequireArtifacts
        );
        assert!(!definition.options.show_progress);
    }
}
