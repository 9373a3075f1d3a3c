use std::path::{Path, PathBuf};
use std::sync::Arc;

use dnsfw_remote::testing::{FakeConnector, FakeHost};
use dnsfw_runner::prelude::*;
use dnsfw_summary_model::{load_summary_runs, RunSummary};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const CAPTURE: &str = "/tmp/sar_output_dnsfw_rpz_30.txt";

/// A capture whose `sys` column isn't a number.
const MALFORMED_CAPTURE: &[u8] = b"14:23:01 all 1 2 x 4 5 6 7 8 9 10\n";

/// Records the commands it is asked to run and writes the request log a load tool would.
#[derive(Default, Clone)]
struct FakeProcesses {
    commands: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl FakeProcesses {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

impl ProcessRunner for FakeProcesses {
    fn execute(&self, command: &LocalCommand) -> Result<ProcessOutput, LocalProcessError> {
        self.commands.lock().push(command.to_string());

        if let Some(path) = command
            .args
            .iter()
            .find_map(|arg| arg.strip_prefix("--log-requests-path="))
        {
            std::fs::write(path, "request log").expect("Failed to write request log");
        }

        if self.fail {
            return Err(LocalProcessError::Failed {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "connection refused".to_string(),
            });
        }
        Ok(ProcessOutput::default())
    }
}

fn sar_capture() -> Vec<u8> {
    std::fs::read(
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../metrics/sar_parse/tests/sar_output_dnsfw_rpz_30.txt"),
    )
    .expect("Failed to read sar fixture")
}

fn sample_cli_cfg(results_root: &Path, percents: &[u8]) -> BenchCli {
    BenchCli {
        test_type: TestType::PolicyFilter,
        percents: if percents.is_empty() {
            PercentSelection::Unused
        } else {
            PercentSelection::of(
                percents
                    .iter()
                    .map(|p| MaliciousPercent::new(*p).unwrap())
                    .collect(),
            )
        },
        wait_time: None,
        common: CommonArgs {
            config: Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/no_settle_delays.toml")),
            password: Some("secret".to_string()),
            results_root: Some(results_root.to_path_buf()),
            no_progress: true,
            ..Default::default()
        },
    }
}

fn results_dir(results_root: &Path) -> PathBuf {
    std::fs::read_dir(results_root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| {
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("results_")
        })
        .expect("No results directory created")
}

fn run_summaries(results_root: &Path) -> Vec<RunSummary> {
    load_summary_runs(results_dir(results_root).join(RUN_SUMMARY_FILE)).unwrap()
}

#[test]
fn sweep_continues_past_connection_failure() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default()
        .capture_content(&sar_capture())
        .fail_connection_attempt(1);

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(
            Profile::ThroughputSweep,
            sample_cli_cfg(root.path(), &[10, 20, 30]),
        ),
        &FakeConnector::new(host.clone()),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert_eq!(
        summary,
        SweepSummary {
            total_runs: 3,
            successful_runs: 2,
            failed_parameter_values: vec![Some(MaliciousPercent::new(20).unwrap())],
        }
    );
    assert_eq!(host.connect_attempts(), 3);
    assert_eq!(host.session_count(), 2);
    assert_eq!(host.close_count(0), 1);
    assert_eq!(host.close_count(1), 1);

    let summaries = run_summaries(root.path());
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[1].failure_stage, Some(Stage::Connect));
    assert_eq!(summaries[1].final_stage, Stage::Connect);
    assert_eq!(summaries[1].malicious_percent, Some(20));
    assert!(summaries[2].succeeded);
    assert_eq!(summaries[2].final_stage, Stage::Done);
}

#[test]
fn sends_commands_in_stage_order() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default().capture_content(&sar_capture());
    let processes = FakeProcesses::default();

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(
            Profile::ThroughputSweep,
            sample_cli_cfg(root.path(), &[30]),
        ),
        &FakeConnector::new(host.clone()),
        &processes,
    )
    .unwrap();

    assert!(summary.all_succeeded());
    assert_eq!(
        host.sent_lines(0),
        vec![
            "sudo su -".to_string(),
            "secret".to_string(),
            "systemctl restart named".to_string(),
            format!("sar -u ALL -P ALL 1 -t 1 > {CAPTURE} &"),
            format!("chmod 644 {CAPTURE}"),
            format!("rm -f {CAPTURE}"),
        ]
    );
    assert!(!host.has_file(Path::new(CAPTURE)));
    assert_eq!(
        processes.commands(),
        vec![
            "dnspyre -d 60s -c 60000 --server 192.0.2.10 --request-delay=1ms \
             --separate-worker-connections @output/domain_30.txt"
                .to_string()
        ]
    );

    let dir = results_dir(root.path());
    let csv = std::fs::read_to_string(dir.join("sar_output_dnsfw_rpz_30.csv")).unwrap();
    assert_eq!(csv.lines().count(), 10);
    assert!(
        csv.starts_with("Timestamp,CPU,usr,nice,sys,iowait,steal,irq,soft,guest,gnice,idle\r\n")
    );
    assert_eq!(
        std::fs::read(dir.join("sar_output_dnsfw_rpz_30.txt")).unwrap(),
        sar_capture()
    );

    let summaries = run_summaries(root.path());
    assert!(summaries[0].diagnostics.is_empty());
    assert_eq!(summaries[0].artifacts.len(), 2);
    assert_eq!(summaries[0].profile, "dns_throughput_sweep");
}

#[test]
fn lenient_run_succeeds_without_telemetry() {
    let root = TempDir::new().unwrap();
    // No capture content, so the capture never produces a file to retrieve
    let host = FakeHost::default();

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(
            Profile::ThroughputSweep,
            sample_cli_cfg(root.path(), &[30]),
        ),
        &FakeConnector::new(host.clone()),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert!(summary.all_succeeded());
    let summaries = run_summaries(root.path());
    assert!(summaries[0].succeeded);
    assert_eq!(
        summaries[0]
            .diagnostics
            .iter()
            .map(|d| d.stage)
            .collect::<Vec<_>>(),
        vec![Stage::FetchArtifacts, Stage::Parse]
    );
    assert_eq!(host.close_count(0), 1);
}

#[test]
fn strict_run_fails_without_telemetry() {
    let root = TempDir::new().unwrap();
    let mut cli = sample_cli_cfg(root.path(), &[30]);
    cli.common.strict = true;

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(Profile::ThroughputSweep, cli),
        &FakeConnector::new(FakeHost::default()),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert_eq!(summary.successful_runs, 0);
    let summaries = run_summaries(root.path());
    assert!(!summaries[0].succeeded);
    assert_eq!(summaries[0].failure_stage, Some(Stage::FetchArtifacts));
}

#[test]
fn load_failure_is_not_fatal() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default().capture_content(&sar_capture());

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(Profile::CpuUsage, sample_cli_cfg(root.path(), &[30])),
        &FakeConnector::new(host.clone()),
        &FakeProcesses::failing(),
    )
    .unwrap();

    assert!(summary.all_succeeded());
    let summaries = run_summaries(root.path());
    assert_eq!(summaries[0].diagnostics.len(), 1);
    assert_eq!(summaries[0].diagnostics[0].stage, Stage::GenerateLoad);
    assert!(summaries[0].diagnostics[0]
        .message
        .contains("connection refused"));
}

#[test]
fn cpu_usage_restarts_twice_without_password() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default().capture_content(&sar_capture());

    run_with(
        BenchmarkDefinitionBuilder::new(Profile::CpuUsage, sample_cli_cfg(root.path(), &[30])),
        &FakeConnector::new(host.clone()),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert_eq!(
        host.sent_lines(0)[..3].to_vec(),
        vec![
            "sudo su -",
            "systemctl restart named",
            "/usr/bin/systemctl restart named",
        ]
    );
}

#[test]
fn latency_probes_and_relocates_request_log() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default().capture_content(&sar_capture());
    let processes = FakeProcesses::default();

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(Profile::QueryLatency, sample_cli_cfg(root.path(), &[])),
        &FakeConnector::new(host.clone()),
        &processes,
    )
    .unwrap();

    assert!(summary.all_succeeded());
    let commands = processes.commands();
    assert_eq!(commands[0], "dig @192.0.2.10 sicredi.com.br");
    assert!(commands[1].starts_with("dnspyre -n 200 -c 5"));

    let dir = results_dir(root.path());
    assert!(dir.join("requests_l_dnsfw_rpz.log").exists());
    assert!(!root.path().join("requests_l_dnsfw_rpz.log").exists());
    assert!(dir.join("sar_output_dnsfw_rpz.csv").exists());
    assert!(host.sent_lines(0)[2]
        .starts_with("sar -u ALL -P ALL 1 -t 1 > /tmp/sar_output_dnsfw_rpz.txt"));
}

#[test]
fn verified_settling_completes_run() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default().capture_content(&sar_capture());
    let mut cli = sample_cli_cfg(root.path(), &[]);
    cli.common.settle_mode = Some(SettleMode::Verified);
    cli.common.strict = true;

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(Profile::ResperfThroughput, cli),
        &FakeConnector::new(host.clone()),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert!(summary.all_succeeded());
    assert!(run_summaries(root.path())[0].diagnostics.is_empty());
}

#[test]
fn verified_settling_reports_missing_capture() {
    let root = TempDir::new().unwrap();
    let mut cli = sample_cli_cfg(root.path(), &[]);
    cli.common.settle_mode = Some(SettleMode::Verified);

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(Profile::ResperfThroughput, cli),
        &FakeConnector::new(FakeHost::default()),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert!(summary.all_succeeded());
    let stages = run_summaries(root.path())[0]
        .diagnostics
        .iter()
        .map(|d| d.stage)
        .collect::<Vec<_>>();
    assert_eq!(
        stages,
        vec![
            Stage::StartCapture,
            Stage::FixPermissions,
            Stage::FetchArtifacts,
            Stage::Parse
        ]
    );
}

#[test]
fn lenient_run_succeeds_with_malformed_capture() {
    let root = TempDir::new().unwrap();
    let host = FakeHost::default().capture_content(MALFORMED_CAPTURE);

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(
            Profile::ThroughputSweep,
            sample_cli_cfg(root.path(), &[30]),
        ),
        &FakeConnector::new(host),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert!(summary.all_succeeded());
    let summaries = run_summaries(root.path());
    assert!(summaries[0].succeeded);
    assert_eq!(summaries[0].final_stage, Stage::Done);
    assert_eq!(summaries[0].diagnostics.len(), 1);
    assert_eq!(summaries[0].diagnostics[0].stage, Stage::Parse);
    assert!(summaries[0].diagnostics[0]
        .message
        .contains("field 'sys' has non-numeric value 'x'"));
    assert!(!results_dir(root.path())
        .join("sar_output_dnsfw_rpz_30.csv")
        .exists());
}

#[test]
fn strict_run_fails_with_malformed_capture() {
    let root = TempDir::new().unwrap();
    let mut cli = sample_cli_cfg(root.path(), &[30]);
    cli.common.strict = true;

    let summary = run_with(
        BenchmarkDefinitionBuilder::new(Profile::ThroughputSweep, cli),
        &FakeConnector::new(FakeHost::default().capture_content(MALFORMED_CAPTURE)),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert_eq!(summary.successful_runs, 0);
    let summaries = run_summaries(root.path());
    assert!(!summaries[0].succeeded);
    assert_eq!(summaries[0].failure_stage, Some(Stage::Parse));
    assert_eq!(summaries[0].final_stage, Stage::Done);
    // The raw capture was retrieved, only the parse failed
    assert_eq!(
        summaries[0].artifacts,
        vec![results_dir(root.path()).join("sar_output_dnsfw_rpz_30.txt")]
    );
}

#[test]
fn detects_artifacts_overwritten_by_another_profile() {
    let root = TempDir::new().unwrap();
    let cpu_usage = BenchmarkDefinitionBuilder::new(
        Profile::CpuUsage,
        sample_cli_cfg(root.path(), &[30]),
    )
    .build()
    .unwrap();
    let artifacts = RunArtifactSet::new(&cpu_usage.runs[0], chrono::Local::now().date_naive());
    assert!(artifacts.existing_local_artifacts().is_empty());

    run_with(
        BenchmarkDefinitionBuilder::new(
            Profile::ThroughputSweep,
            sample_cli_cfg(root.path(), &[30]),
        ),
        &FakeConnector::new(FakeHost::default().capture_content(&sar_capture())),
        &FakeProcesses::default(),
    )
    .unwrap();

    assert_eq!(
        artifacts.existing_local_artifacts(),
        vec![artifacts.capture_local(), artifacts.csv_local()]
    );
}
