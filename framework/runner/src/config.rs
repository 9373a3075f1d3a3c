use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use dnsfw_remote::{Auth, HostTarget, Secret, VerifyPolicy};
use serde::Deserialize;

use crate::cli::CommonArgs;
use crate::orchestrator::SettleMode;
use crate::params::SettleTimings;
use crate::types::BenchResult;

/// Benchmark configuration, read from a TOML file and overridden from the command line.
///
/// Every key is optional. A missing file section uses the defaults, which match the lab setup
/// the benchmarks were first run against.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub remote: RemoteConfig,
    pub timing: TimingConfig,
    pub load: LoadConfig,
    pub capture: CaptureConfig,
    /// Parent of the dated results directories.
    pub results_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Used to log in and at the `sudo` prompt. Prefer `DNSFW_SSH_PASSWORD` over the file.
    pub password: Option<String>,
    /// Log in with a private key instead of the password.
    pub key_file: Option<PathBuf>,
    pub key_passphrase: Option<String>,
    pub connect_timeout_ms: u64,
    /// The systemd unit restarted before each run.
    pub service: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.72".to_string(),
            port: 22,
            username: "user".to_string(),
            password: None,
            key_file: None,
            key_passphrase: None,
            connect_timeout_ms: 10_000,
            service: "named".to_string(),
        }
    }
}

/// Settle delays in milliseconds.
///
/// The `restart_ms`, `capture_start_ms` and `post_load_ms` delays differ between profiles. They
/// only override the profile defaults when set.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub shell_open_ms: u64,
    pub elevate_ms: u64,
    pub password_ms: u64,
    pub restart_ms: Option<u64>,
    pub capture_start_ms: Option<u64>,
    pub post_load_ms: Option<u64>,
    pub chmod_ms: u64,
    pub post_relocate_ms: u64,
    pub settle_mode: SettleMode,
    pub verify_timeout_ms: u64,
    pub verify_poll_interval_ms: u64,
    /// Pause between two runs of a sweep.
    pub wait_between_runs_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            shell_open_ms: 1_000,
            elevate_ms: 2_000,
            password_ms: 2_000,
            restart_ms: None,
            capture_start_ms: None,
            post_load_ms: None,
            chmod_ms: 1_000,
            post_relocate_ms: 1_000,
            settle_mode: SettleMode::Fixed,
            verify_timeout_ms: 10_000,
            verify_poll_interval_ms: 250,
            wait_between_runs_secs: 10,
        }
    }
}

impl TimingConfig {
    pub fn settle_timings(&self) -> SettleTimings {
        SettleTimings {
            shell_open: Duration::from_millis(self.shell_open_ms),
            elevate: Duration::from_millis(self.elevate_ms),
            password: Duration::from_millis(self.password_ms),
            chmod: Duration::from_millis(self.chmod_ms),
            post_relocate: Duration::from_millis(self.post_relocate_ms),
        }
    }

    pub fn verify_policy(&self) -> VerifyPolicy {
        VerifyPolicy {
            timeout: Duration::from_millis(self.verify_timeout_ms),
            poll_interval: Duration::from_millis(self.verify_poll_interval_ms),
        }
    }

    /// `configured` if set, otherwise the profile default.
    pub fn or_default(configured: Option<u64>, default: Duration) -> Duration {
        configured.map(Duration::from_millis).unwrap_or(default)
    }
}

/// Arguments for the local load generators.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// The resolver to send queries to. Defaults to the remote host.
    pub server: Option<String>,
    pub duration_secs: u64,
    pub throughput_concurrency: u32,
    pub cpu_concurrency: u32,
    pub request_delay: String,
    /// Holds one `domain_{percent}.txt` query list per malicious percentage.
    pub domain_lists_dir: PathBuf,
    pub latency_domains: PathBuf,
    pub latency_requests: u32,
    pub latency_concurrency: u32,
    pub latency_request_delay: String,
    pub resperf_query_file: PathBuf,
    /// Resolved once with `dig` before the latency load starts.
    pub probe_domain: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            server: None,
            duration_secs: 60,
            throughput_concurrency: 60_000,
            cpu_concurrency: 40_000,
            request_delay: "1ms".to_string(),
            domain_lists_dir: PathBuf::from("output"),
            latency_domains: PathBuf::from("domains.txt"),
            latency_requests: 200,
            latency_concurrency: 5,
            latency_request_delay: "1s".to_string(),
            resperf_query_file: PathBuf::from("query_file.txt"),
            probe_domain: "sicredi.com.br".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub remote_dir: PathBuf,
    pub interval_secs: u64,
    /// Overrides the number of samples the profile captures.
    pub samples: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            remote_dir: PathBuf::from("/tmp"),
            interval_secs: 1,
            samples: None,
        }
    }
}

impl BenchConfig {
    /// Read the config file if one is given, otherwise use the defaults.
    pub fn load(path: Option<&Path>) -> BenchResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {} as TOML", path.display()))
    }

    /// Read the config file named on the command line and apply the command line overrides.
    pub fn from_args(args: &CommonArgs) -> BenchResult<Self> {
        let mut config = Self::load(args.config.as_deref())?;
        config.apply_overrides(args);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &CommonArgs) {
        if let Some(host) = &args.host {
            self.remote.host = host.clone();
        }
        if let Some(username) = &args.username {
            self.remote.username = username.clone();
        }
        if let Some(password) = &args.password {
            self.remote.password = Some(password.clone());
        }
        if let Some(key_file) = &args.key_file {
            self.remote.key_file = Some(key_file.clone());
        }
        if let Some(results_root) = &args.results_root {
            self.results_root = results_root.clone();
        }
        if let Some(settle_mode) = args.settle_mode {
            self.timing.settle_mode = settle_mode;
        }
    }

    /// The resolver the load generators query.
    pub fn load_server(&self) -> &str {
        self.load.server.as_deref().unwrap_or(&self.remote.host)
    }

    /// The host to connect to and how to authenticate.
    pub fn host_target(&self) -> BenchResult<HostTarget> {
        let auth = match (&self.remote.key_file, &self.remote.password) {
            (Some(private_key), _) => Auth::KeyFile {
                private_key: private_key.clone(),
                passphrase: self.remote.key_passphrase.clone(),
            },
            (None, Some(password)) => Auth::Password(password.clone()),
            (None, None) => bail!(
                "No SSH credentials given. Set --password, DNSFW_SSH_PASSWORD or --key-file."
            ),
        };

        Ok(
            HostTarget::new(self.remote.host.clone(), self.remote.username.clone(), auth)
                .port(self.remote.port)
                .timeout(Duration::from_millis(self.remote.connect_timeout_ms)),
        )
    }

    /// The secret typed at the `sudo` prompt.
    pub fn elevation_secret(&self) -> BenchResult<Secret> {
        self.remote.password.as_ref().map(Secret::new).context(
            "The remote 'sudo' prompt needs a password. Set --password or DNSFW_SSH_PASSWORD.",
        )
    }
}
