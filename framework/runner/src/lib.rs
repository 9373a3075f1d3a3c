mod artifact;
mod bin_path;
mod cli;
mod config;
mod definition;
mod init;
mod matrix;
mod monitor;
mod orchestrator;
mod params;
mod process;
mod progress;
mod run;
mod shutdown;
mod types;
mod workload;

pub mod prelude {
    pub use crate::artifact::{results_dir, run_suffix, RunArtifactSet, RUN_SUMMARY_FILE};
    pub use crate::bin_path::{tool_path, tool_path_env};
    pub use crate::cli::{BenchCli, CommonArgs, PercentSelection};
    pub use crate::config::{BenchConfig, CaptureConfig, LoadConfig, RemoteConfig, TimingConfig};
    pub use crate::definition::{BenchmarkDefinition, BenchmarkDefinitionBuilder};
    pub use crate::init::init;
    pub use crate::matrix::{run_sweep, summary_table, SweepSummary};
    pub use crate::orchestrator::{
        Orchestrator, OutcomePolicy, RunOptions, RunOutcome, SettleMode,
    };
    pub use crate::params::{ExperimentParameters, InvalidPercent, MaliciousPercent, SettleTimings};
    pub use crate::process::{
        LocalCommand, LocalProcessError, LocalProcessRunner, ProcessOutput, ProcessRunner,
    };
    pub use crate::run::{run, run_with};
    pub use crate::types::BenchResult;
    pub use crate::workload::{Profile, ServiceRestart, Workload};

    pub use dnsfw_summary_model::{Stage, StepDiagnostic, TestType};
}
