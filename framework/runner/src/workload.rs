use std::path::{Path, PathBuf};
use std::time::Duration;

use dnsfw_summary_model::TestType;

use crate::artifact::{request_log_name, run_suffix};
use crate::config::{BenchConfig, TimingConfig};
use crate::params::MaliciousPercent;
use crate::process::LocalCommand;

/// The benchmark variants. Each one drives a different load against the resolver while the
/// remote CPU usage is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Profile {
    /// Maximum query throughput with `dnspyre`, optionally swept across percentages.
    #[display("dns_throughput_sweep")]
    ThroughputSweep,
    /// A fixed `dnspyre` load after restarting the resolver twice.
    #[display("cpu_usage")]
    CpuUsage,
    /// A slow `dnspyre` load that logs every request with its latency.
    #[display("query_latency")]
    QueryLatency,
    /// A `resperf-report` run.
    #[display("resperf_throughput")]
    ResperfThroughput,
}

/// A `systemctl restart` sent before the capture starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRestart {
    pub systemctl: String,
    pub unit: String,
    pub settle: Duration,
}

/// What a profile does on the remote and the local side during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// Whether the `sudo` prompt is answered with the password.
    pub elevate_with_password: bool,
    pub restarts: Vec<ServiceRestart>,
    pub capture_samples: u64,
    pub capture_settle: Duration,
    /// Run once before the load, its failure doesn't stop the load.
    pub probe: Option<LocalCommand>,
    pub load: Vec<LocalCommand>,
    pub post_load_settle: Duration,
    /// The request log the load writes, relocated into the results directory afterwards.
    pub request_log: Option<PathBuf>,
}

impl Profile {
    /// Whether runs of this profile need a malicious percentage.
    pub fn requires_percent(self) -> bool {
        matches!(self, Profile::ThroughputSweep | Profile::CpuUsage)
    }

    /// Build the workload of one run.
    ///
    /// A request log is written to the configured results root and relocated into the dated
    /// results directory after the load.
    pub fn workload(
        self,
        test_type: TestType,
        percent: Option<MaliciousPercent>,
        config: &BenchConfig,
    ) -> Workload {
        let timing = &config.timing;
        let load = &config.load;
        let server = config.load_server().to_string();
        let service = config.remote.service.clone();
        let restart = |systemctl: &str, default: Duration| ServiceRestart {
            systemctl: systemctl.to_string(),
            unit: service.clone(),
            settle: TimingConfig::or_default(timing.restart_ms, default),
        };
        let capture_samples = |default: u64| config.capture.samples.unwrap_or(default);
        let capture_settle = |default: Duration| {
            TimingConfig::or_default(timing.capture_start_ms, default)
        };
        let post_load_settle =
            |default: Duration| TimingConfig::or_default(timing.post_load_ms, default);
        let domain_list = || {
            let name = match percent {
                Some(percent) => format!("domain_{percent}.txt"),
                None => "domain.txt".to_string(),
            };
            format!("@{}", display(&load.domain_lists_dir.join(name)))
        };
        let dnspyre_sweep = |concurrency: u32| {
            LocalCommand::new("dnspyre").args([
                "-d".to_string(),
                format!("{}s", load.duration_secs),
                "-c".to_string(),
                concurrency.to_string(),
                "--server".to_string(),
                server.clone(),
                format!("--request-delay={}", load.request_delay),
                "--separate-worker-connections".to_string(),
                domain_list(),
            ])
        };

        match self {
            Profile::ThroughputSweep => Workload {
                elevate_with_password: true,
                restarts: vec![restart("systemctl", Duration::from_secs(5))],
                capture_samples: capture_samples(60),
                capture_settle: capture_settle(Duration::from_secs(3)),
                probe: None,
                load: vec![dnspyre_sweep(load.throughput_concurrency)],
                post_load_settle: post_load_settle(Duration::from_secs(5)),
                request_log: None,
            },
            Profile::CpuUsage => Workload {
                elevate_with_password: false,
                restarts: vec![
                    restart("systemctl", Duration::from_secs(5)),
                    restart("/usr/bin/systemctl", Duration::from_secs(2)),
                ],
                capture_samples: capture_samples(60),
                capture_settle: capture_settle(Duration::from_secs(1)),
                probe: None,
                load: vec![dnspyre_sweep(load.cpu_concurrency)],
                post_load_settle: post_load_settle(Duration::from_secs(1)),
                request_log: None,
            },
            Profile::QueryLatency => {
                let request_log = config
                    .results_root
                    .join(request_log_name(&run_suffix(test_type, percent)));
                Workload {
                    elevate_with_password: true,
                    restarts: Vec::new(),
                    capture_samples: capture_samples(30),
                    capture_settle: capture_settle(Duration::from_secs(1)),
                    probe: Some(
                        LocalCommand::new("dig")
                            .arg(format!("@{server}"))
                            .arg(load.probe_domain.clone()),
                    ),
                    load: vec![LocalCommand::new("dnspyre").args([
                        "-n".to_string(),
                        load.latency_requests.to_string(),
                        "-c".to_string(),
                        load.latency_concurrency.to_string(),
                        "--server".to_string(),
                        server.clone(),
                        format!("--request-delay={}", load.latency_request_delay),
                        "--log-requests".to_string(),
                        format!("--log-requests-path={}", display(&request_log)),
                        format!("@{}", display(&load.latency_domains)),
                    ])],
                    post_load_settle: post_load_settle(Duration::from_secs(1)),
                    request_log: Some(request_log),
                }
            }
            Profile::ResperfThroughput => Workload {
                elevate_with_password: true,
                restarts: Vec::new(),
                capture_samples: capture_samples(60),
                capture_settle: capture_settle(Duration::from_secs(3)),
                probe: None,
                load: vec![LocalCommand::new("resperf-report").args([
                    "-R".to_string(),
                    "-s".to_string(),
                    server.clone(),
                    "-d".to_string(),
                    display(&load.resperf_query_file),
                    "-vv".to_string(),
                ])],
                post_load_settle: post_load_settle(Duration::from_secs(5)),
                request_log: None,
            },
        }
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
