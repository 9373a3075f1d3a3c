use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dnsfw_remote::{CaptureSpec, ConnectionError, Connect, RemoteControl, VerifyPolicy};
use dnsfw_sar_parse::convert_file;
use dnsfw_summary_model::{append_run_summary, RunSummary, Stage, StepDiagnostic};
use serde::Deserialize;

use crate::artifact::RunArtifactSet;
use crate::monitor::start_monitor;
use crate::params::ExperimentParameters;
use crate::process::ProcessRunner;
use crate::progress::start_progress;
use crate::shutdown::HelperThread;

/// Mode the capture file is given so it can be read over SFTP.
const READABLE_MODE: u32 = 0o644;

/// How the orchestrator waits for remote commands to take effect.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Deserialize,
    clap::ValueEnum,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SettleMode {
    /// Sleep a fixed delay after each command.
    #[default]
    #[display("fixed")]
    Fixed,
    /// Poll over SFTP until the effect of a command is visible, falling back to a diagnostic on
    /// timeout. Commands without a visible effect still use their fixed delay.
    #[display("verified")]
    Verified,
}

/// Which failures make a run count as failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
pub enum OutcomePolicy {
    /// Only a failure to connect fails the run. Every other failure is a diagnostic.
    #[default]
    #[display("lenient")]
    Lenient,
    /// Also fail the run if no artifact was retrieved or the capture couldn't be parsed.
    #[display("require_artifacts")]
    RequireArtifacts,
}

/// Settings that apply to every run of a benchmark.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub outcome_policy: OutcomePolicy,
    pub settle_mode: SettleMode,
    pub verify: VerifyPolicy,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            outcome_policy: OutcomePolicy::default(),
            settle_mode: SettleMode::default(),
            verify: VerifyPolicy::default(),
            show_progress: true,
        }
    }
}

/// The result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub parameters: ExperimentParameters,
    pub run_id: String,
    pub succeeded: bool,
    pub failure_stage: Option<Stage>,
    /// [`Stage::Done`] once every step ran, [`Stage::Connect`] if the run couldn't connect.
    pub final_stage: Stage,
    pub diagnostics: Vec<StepDiagnostic>,
    /// Local artifacts that were retrieved, relocated or parsed.
    pub artifacts: Vec<PathBuf>,
    pub duration: Duration,
}

#[derive(Default)]
struct RunRecord {
    diagnostics: Vec<StepDiagnostic>,
    fetched: Vec<PathBuf>,
    artifacts: Vec<PathBuf>,
    parse_failed: bool,
}

impl RunRecord {
    fn record(&mut self, stage: Stage, message: impl Display) {
        let message = message.to_string();
        log::error!("[{stage}] {message}");
        self.diagnostics.push(StepDiagnostic::new(stage, message));
    }

    fn check<T, E: Display>(&mut self, stage: Stage, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(stage, e);
                None
            }
        }
    }
}

/// Runs one benchmark end to end against a remote host.
///
/// The steps always run in [`Stage`] order. Only a failure to connect ends a run early, every
/// later failure is recorded as a [`StepDiagnostic`] and the run carries on. Whether a run with
/// diagnostics succeeded is decided by the [`OutcomePolicy`].
pub struct Orchestrator<'a, C: Connect, P: ProcessRunner> {
    connector: &'a C,
    processes: &'a P,
    options: RunOptions,
}

impl<'a, C: Connect, P: ProcessRunner> Orchestrator<'a, C, P> {
    pub fn new(connector: &'a C, processes: &'a P, options: RunOptions) -> Self {
        Self {
            connector,
            processes,
            options,
        }
    }

    /// Execute one run. Never fails, failures are reported in the outcome.
    pub fn execute(&self, parameters: &ExperimentParameters) -> RunOutcome {
        let run_id = nanoid::nanoid!();
        let started_at = chrono::Local::now();
        let started = Instant::now();
        let artifacts = RunArtifactSet::new(parameters, started_at.date_naive());
        let mut record = RunRecord::default();

        let connected = self.drive(parameters, &artifacts, &mut record);

        let (failure_stage, final_stage) = match connected {
            Err(e) => {
                record.record(Stage::Connect, e);
                (Some(Stage::Connect), Stage::Connect)
            }
            Ok(()) => (self.judge(&record), Stage::Done),
        };

        let outcome = RunOutcome {
            parameters: parameters.clone(),
            run_id,
            succeeded: failure_stage.is_none(),
            failure_stage,
            final_stage,
            diagnostics: record.diagnostics,
            artifacts: record.artifacts,
            duration: started.elapsed(),
        };

        self.write_summary(&outcome, &artifacts, started_at.timestamp());

        outcome
    }

    fn judge(&self, record: &RunRecord) -> Option<Stage> {
        match self.options.outcome_policy {
            OutcomePolicy::Lenient => None,
            OutcomePolicy::RequireArtifacts if record.fetched.is_empty() => {
                Some(Stage::FetchArtifacts)
            }
            OutcomePolicy::RequireArtifacts if record.parse_failed => Some(Stage::Parse),
            OutcomePolicy::RequireArtifacts => None,
        }
    }

    fn drive(
        &self,
        parameters: &ExperimentParameters,
        artifacts: &RunArtifactSet,
        record: &mut RunRecord,
    ) -> Result<(), ConnectionError> {
        log::info!("Connecting to {}...", parameters.target.host);
        let transport = self.connector.connect(&parameters.target)?;
        let mut control = RemoteControl::open(transport, parameters.target.host.clone())?;
        log::info!("Successfully connected!");
        control.settle(parameters.timing.shell_open);

        if let Err(e) = std::fs::create_dir_all(artifacts.results_dir()) {
            record.record(
                Stage::FetchArtifacts,
                format!(
                    "Failed to create results directory {}: {e}",
                    artifacts.results_dir().display()
                ),
            );
        }

        for path in artifacts.existing_local_artifacts() {
            log::warn!(
                "{} already exists and will be overwritten by this run",
                path.display()
            );
        }

        self.elevate(&mut control, parameters, record);
        self.restart_service(&mut control, parameters, record);
        let (capture, capture_started) =
            self.start_capture(&mut control, parameters, artifacts, record);
        self.generate_load(&mut control, parameters, artifacts, &capture, record);
        self.fix_permissions(
            &mut control,
            parameters,
            artifacts,
            &capture,
            capture_started,
            record,
        );
        self.fetch_artifacts(&mut control, artifacts, record);
        self.clean_remote(&mut control, artifacts, record);
        self.parse(artifacts, record);

        control.close();
        log::info!(
            "All steps completed for {}. Results have been saved in the '{}' directory",
            parameters.label(),
            artifacts.results_dir().display()
        );

        Ok(())
    }

    fn elevate(
        &self,
        control: &mut RemoteControl<C::Transport>,
        parameters: &ExperimentParameters,
        record: &mut RunRecord,
    ) {
        log::info!("Elevating to root privileges...");
        record.check(Stage::Elevate, control.elevate());
        control.settle(parameters.timing.elevate);

        if parameters.workload.elevate_with_password {
            match &parameters.elevation_secret {
                Some(secret) => {
                    record.check(Stage::Elevate, control.answer_prompt(secret));
                    control.settle(parameters.timing.password);
                }
                None => record.record(Stage::Elevate, "No password to answer the sudo prompt with"),
            }
        }
    }

    fn restart_service(
        &self,
        control: &mut RemoteControl<C::Transport>,
        parameters: &ExperimentParameters,
        record: &mut RunRecord,
    ) {
        for restart in &parameters.workload.restarts {
            log::info!("Restarting {}...", restart.unit);
            record.check(
                Stage::RestartService,
                control.restart_service(&restart.systemctl, &restart.unit),
            );
            control.settle(restart.settle);
        }
    }

    fn start_capture(
        &self,
        control: &mut RemoteControl<C::Transport>,
        parameters: &ExperimentParameters,
        artifacts: &RunArtifactSet,
        record: &mut RunRecord,
    ) -> (CaptureSpec, Instant) {
        let capture = CaptureSpec {
            output: artifacts.capture_remote().to_path_buf(),
            interval_secs: parameters.capture_interval_secs,
            samples: parameters.workload.capture_samples,
        };

        log::info!(
            "Starting CPU capture to {} for {:?}...",
            capture.output.display(),
            capture.duration()
        );
        let sent = record
            .check(Stage::StartCapture, control.start_capture(&capture))
            .is_some();
        let capture_started = Instant::now();

        match self.options.settle_mode {
            SettleMode::Fixed => control.settle(parameters.workload.capture_settle),
            SettleMode::Verified if sent => {
                record.check(
                    Stage::StartCapture,
                    control.wait_for_file(&capture.output, &self.options.verify),
                );
            }
            SettleMode::Verified => {}
        }

        (capture, capture_started)
    }

    fn generate_load(
        &self,
        control: &mut RemoteControl<C::Transport>,
        parameters: &ExperimentParameters,
        artifacts: &RunArtifactSet,
        capture: &CaptureSpec,
        record: &mut RunRecord,
    ) {
        let workload = &parameters.workload;
        let helpers = self.start_helpers(capture.duration());

        if let Some(probe) = &workload.probe {
            log::info!("Probing the resolver: {probe}");
            if let Err(e) = self.processes.execute(probe) {
                record.record(Stage::GenerateLoad, e);
            }
        }

        for command in &workload.load {
            log::info!("Starting local load: {command}");
            match self.processes.execute(command) {
                Ok(_) => log::info!("Local load finished"),
                Err(e) => record.record(Stage::GenerateLoad, e),
            }
        }

        helpers.into_iter().for_each(HelperThread::stop);
        control.settle(workload.post_load_settle);

        if let Some((from, to)) = artifacts.request_log() {
            log::info!("Moving request log to {}...", artifacts.results_dir().display());
            match relocate(from, to) {
                Ok(()) => record.artifacts.push(to.to_path_buf()),
                Err(e) => record.record(
                    Stage::GenerateLoad,
                    format!("Failed to move {} to {}: {e}", from.display(), to.display()),
                ),
            }
            control.settle(parameters.timing.post_relocate);
        }
    }

    fn start_helpers(&self, capture_window: Duration) -> Vec<HelperThread> {
        let mut helpers = Vec::with_capacity(2);
        if self.options.show_progress {
            helpers.extend(start_progress(capture_window));
        }
        helpers.extend(start_monitor());
        helpers
    }

    fn fix_permissions(
        &self,
        control: &mut RemoteControl<C::Transport>,
        parameters: &ExperimentParameters,
        artifacts: &RunArtifactSet,
        capture: &CaptureSpec,
        capture_started: Instant,
        record: &mut RunRecord,
    ) {
        if self.options.settle_mode == SettleMode::Verified {
            let remaining = capture.duration().saturating_sub(capture_started.elapsed());
            if !remaining.is_zero() {
                log::info!("Waiting {remaining:?} for the capture window to end...");
                std::thread::sleep(remaining);
            }
        }

        let paths = artifacts.remote_paths();
        record.check(
            Stage::FixPermissions,
            control.set_permissions(&paths, READABLE_MODE),
        );

        match self.options.settle_mode {
            SettleMode::Fixed => control.settle(parameters.timing.chmod),
            SettleMode::Verified => {
                for path in &paths {
                    record.check(
                        Stage::FixPermissions,
                        control.wait_for_mode(path, READABLE_MODE, &self.options.verify),
                    );
                }
            }
        }
    }

    fn fetch_artifacts(
        &self,
        control: &mut RemoteControl<C::Transport>,
        artifacts: &RunArtifactSet,
        record: &mut RunRecord,
    ) {
        log::info!("Copying result files from remote host...");
        for (remote, local) in artifacts.fetch_pairs() {
            match control.fetch_file(&remote, &local) {
                Ok(bytes) => {
                    log::info!(
                        "Copied {} to {} ({bytes} bytes)",
                        remote.display(),
                        local.display()
                    );
                    record.fetched.push(local.clone());
                    record.artifacts.push(local);
                }
                Err(e) => record.record(
                    Stage::FetchArtifacts,
                    format!("Error copying {}: {e}", remote.display()),
                ),
            }
        }
    }

    fn clean_remote(
        &self,
        control: &mut RemoteControl<C::Transport>,
        artifacts: &RunArtifactSet,
        record: &mut RunRecord,
    ) {
        log::info!("Cleaning up remote temporary files...");
        record.check(
            Stage::CleanRemote,
            control.remove(&artifacts.remote_paths()),
        );
    }

    fn parse(&self, artifacts: &RunArtifactSet, record: &mut RunRecord) {
        let raw = artifacts.capture_local();
        if !record.fetched.iter().any(|p| p == raw) {
            record.parse_failed = true;
            record.record(
                Stage::Parse,
                format!("Nothing to parse, {} was not retrieved", raw.display()),
            );
            return;
        }

        log::info!("Parsing CPU capture {}...", raw.display());
        match convert_file(raw, artifacts.csv_local()) {
            Ok(_) => record.artifacts.push(artifacts.csv_local().to_path_buf()),
            Err(e) => {
                record.parse_failed = true;
                record.record(
                    Stage::Parse,
                    format!("Failed to parse {}: {e}", raw.display()),
                );
            }
        }
    }

    fn write_summary(&self, outcome: &RunOutcome, artifacts: &RunArtifactSet, started_at: i64) {
        let parameters = &outcome.parameters;
        let mut summary = RunSummary::new(
            outcome.run_id.clone(),
            parameters.profile.to_string(),
            parameters.test_type,
            parameters.malicious_percent.map(|p| p.get()),
            started_at,
            env!("CARGO_PKG_VERSION").to_string(),
        );
        summary.run_duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX);
        summary.succeeded = outcome.succeeded;
        summary.failure_stage = outcome.failure_stage;
        summary.final_stage = outcome.final_stage;
        summary.diagnostics = outcome.diagnostics.clone();
        summary.artifacts = outcome.artifacts.clone();

        summary.add_setting("host", &parameters.target.host);
        summary.add_setting("settle_mode", self.options.settle_mode);
        summary.add_setting("outcome_policy", self.options.outcome_policy);
        summary.add_setting("capture_interval_secs", parameters.capture_interval_secs);
        summary.add_setting("capture_samples", parameters.workload.capture_samples);
        summary.add_setting(
            "load",
            parameters
                .workload
                .load
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        );

        let path = artifacts.run_summary_path();
        let written = std::fs::create_dir_all(artifacts.results_dir())
            .map_err(anyhow::Error::from)
            .and_then(|_| append_run_summary(&summary, path.clone()));
        match written {
            Ok(()) => log::debug!(
                "Run {} ({}) recorded in {}",
                summary.run_id,
                summary.fingerprint(),
                path.display()
            ),
            Err(e) => log::warn!("Failed to record run summary in {}: {e:#}", path.display()),
        }
    }
}

fn relocate(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::rename(from, to).or_else(|_| {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)
    })
}
