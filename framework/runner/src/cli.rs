use std::path::PathBuf;

use clap::{Args, Parser};
use dnsfw_summary_model::{TestType, UnknownTestType};

use crate::orchestrator::SettleMode;
use crate::params::{InvalidPercent, MaliciousPercent};
use crate::workload::Profile;

/// Flags shared by every benchmark binary.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// A TOML file with `[remote]`, `[timing]`, `[load]` and `[capture]` tables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The remote resolver host to connect to over SSH
    #[arg(long)]
    pub host: Option<String>,

    /// The SSH user, who must be allowed to `sudo su -`
    #[arg(long)]
    pub username: Option<String>,

    /// The SSH password, also typed at the `sudo` prompt
    #[arg(long, env = "DNSFW_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Log in with this private key instead of the password
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// The directory to create the dated results directories in
    #[arg(long)]
    pub results_root: Option<PathBuf>,

    /// Wait fixed delays after remote commands, or poll for their effect
    #[arg(long, value_enum)]
    pub settle_mode: Option<SettleMode>,

    /// Fail runs that retrieved no telemetry or couldn't parse it, not only those that couldn't connect
    #[arg(long, default_value = "false")]
    pub strict: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,
}

/// The percentages selected for a run or sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PercentSelection {
    /// The profile doesn't use a malicious percentage.
    Unused,
    /// These percentages, in ascending order without duplicates.
    Some(Vec<MaliciousPercent>),
}

impl PercentSelection {
    pub fn of(mut percents: Vec<MaliciousPercent>) -> Self {
        percents.sort();
        percents.dedup();
        PercentSelection::Some(percents)
    }

    /// One entry per run.
    pub fn runs(&self) -> Vec<Option<MaliciousPercent>> {
        match self {
            PercentSelection::Unused => vec![None],
            PercentSelection::Some(percents) => percents.iter().copied().map(Some).collect(),
        }
    }
}

/// The parsed command line of a benchmark binary.
#[derive(Debug, Clone)]
pub struct BenchCli {
    pub test_type: TestType,
    pub percents: PercentSelection,
    /// Seconds to wait between two runs of a sweep.
    pub wait_time: Option<u64>,
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SweepPercentArgs {
    /// Percentage of malicious domains in the query list. Repeat the flag to sweep several
    #[arg(long, value_parser = parse_percent)]
    percent: Vec<MaliciousPercent>,

    /// Run the benchmark for every percentage from 10 to 90 in steps of 10
    #[arg(long)]
    all_percents: bool,
}

#[derive(Parser, Debug)]
#[command(
    name = "dns_throughput_sweep",
    about = "Measure resolver CPU usage under maximum query throughput"
)]
struct ThroughputSweepCli {
    /// The firewall configuration under test: dnsfw_no, dnsfw_rpz or dnsfw_xdp
    #[arg(value_parser = parse_test_type)]
    test_type: TestType,

    #[command(flatten)]
    percents: SweepPercentArgs,

    /// Seconds to wait between sequential runs
    #[arg(long)]
    wait_time: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(
    name = "cpu_usage",
    about = "Measure resolver CPU usage under a fixed query load"
)]
struct CpuUsageCli {
    /// The firewall configuration under test: dnsfw_no, dnsfw_rpz or dnsfw_xdp
    #[arg(value_parser = parse_test_type)]
    test_type: TestType,

    /// Percentage of malicious domains in the query list
    #[arg(value_parser = parse_percent)]
    malicious_percent: MaliciousPercent,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(
    name = "query_latency",
    about = "Measure per-query resolver latency at a low request rate"
)]
struct QueryLatencyCli {
    /// The firewall configuration under test: dnsfw_no, dnsfw_rpz or dnsfw_xdp
    #[arg(value_parser = parse_test_type)]
    test_type: TestType,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(
    name = "resperf_throughput",
    about = "Measure resolver throughput with resperf"
)]
struct ResperfThroughputCli {
    /// The firewall configuration under test: dnsfw_no, dnsfw_rpz or dnsfw_xdp
    #[arg(value_parser = parse_test_type)]
    test_type: TestType,

    #[command(flatten)]
    common: CommonArgs,
}

impl BenchCli {
    /// Parse the command line for the given profile.
    pub fn parse_for(profile: Profile) -> Self {
        Self::try_parse_from(profile, std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_from<I, T>(profile: Profile, args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(match profile {
            Profile::ThroughputSweep => {
                let cli = ThroughputSweepCli::try_parse_from(args)?;
                let percents = if cli.percents.all_percents {
                    MaliciousPercent::all()
                } else {
                    cli.percents.percent
                };
                BenchCli {
                    test_type: cli.test_type,
                    percents: PercentSelection::of(percents),
                    wait_time: cli.wait_time,
                    common: cli.common,
                }
            }
            Profile::CpuUsage => {
                let cli = CpuUsageCli::try_parse_from(args)?;
                BenchCli {
                    test_type: cli.test_type,
                    percents: PercentSelection::of(vec![cli.malicious_percent]),
                    wait_time: None,
                    common: cli.common,
                }
            }
            Profile::QueryLatency => {
                let cli = QueryLatencyCli::try_parse_from(args)?;
                BenchCli {
                    test_type: cli.test_type,
                    percents: PercentSelection::Unused,
                    wait_time: None,
                    common: cli.common,
                }
            }
            Profile::ResperfThroughput => {
                let cli = ResperfThroughputCli::try_parse_from(args)?;
                BenchCli {
                    test_type: cli.test_type,
                    percents: PercentSelection::Unused,
                    wait_time: None,
                    common: cli.common,
                }
            }
        })
    }
}

fn parse_test_type(s: &str) -> Result<TestType, UnknownTestType> {
    s.parse()
}

fn parse_percent(s: &str) -> Result<MaliciousPercent, InvalidPercent> {
    s.parse()
}
