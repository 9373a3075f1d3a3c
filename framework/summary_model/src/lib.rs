use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// The firewall configuration under test on the remote resolver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum TestType {
    /// The resolver runs without any DNS firewall.
    #[serde(rename = "dnsfw_no")]
    #[display("dnsfw_no")]
    NoFilter,
    /// Malicious domains are filtered by a response policy zone.
    #[serde(rename = "dnsfw_rpz")]
    #[display("dnsfw_rpz")]
    PolicyFilter,
    /// Malicious domains are dropped by an XDP program before reaching the resolver.
    #[serde(rename = "dnsfw_xdp")]
    #[display("dnsfw_xdp")]
    AcceleratedFilter,
}

impl TestType {
    /// The command line names of every test type.
    pub const NAMES: [&'static str; 3] = ["dnsfw_no", "dnsfw_rpz", "dnsfw_xdp"];
}

impl FromStr for TestType {
    type Err = UnknownTestType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dnsfw_no" => Ok(TestType::NoFilter),
            "dnsfw_rpz" => Ok(TestType::PolicyFilter),
            "dnsfw_xdp" => Ok(TestType::AcceleratedFilter),
            other => Err(UnknownTestType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown test type '{0}', expected one of: dnsfw_no, dnsfw_rpz, dnsfw_xdp")]
pub struct UnknownTestType(pub String);

/// The steps of a benchmark run, in the order they are executed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[display("CONNECTED")]
    Connect,
    #[display("ELEVATED")]
    Elevate,
    #[display("SERVICE_RESTARTED")]
    RestartService,
    #[display("CAPTURE_STARTED")]
    StartCapture,
    #[display("LOAD_GENERATED")]
    GenerateLoad,
    #[display("PERMISSIONS_FIXED")]
    FixPermissions,
    #[display("ARTIFACTS_FETCHED")]
    FetchArtifacts,
    #[display("REMOTE_CLEANED")]
    CleanRemote,
    #[display("PARSED")]
    Parse,
    #[display("DONE")]
    Done,
}

/// A non-fatal failure recorded while a run proceeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDiagnostic {
    /// The step that failed.
    pub stage: Stage,
    /// A description of the failure.
    pub message: String,
}

impl StepDiagnostic {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the workload profile that was run
    pub profile: String,
    /// The firewall configuration that was tested
    pub test_type: TestType,
    /// The share of malicious domains in the query list, if the profile uses one
    pub malicious_percent: Option<u8>,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// How long the run took from connecting to closing the session, in milliseconds
    pub run_duration_ms: u64,
    /// Whether the run is considered successful under the configured outcome policy
    pub succeeded: bool,
    /// The first step that made the run fail, if it failed
    pub failure_stage: Option<Stage>,
    /// The stage the run stopped at, [Stage::Done] unless it couldn't connect
    pub final_stage: Stage,
    /// Every non-fatal failure that was recorded, in the order they happened
    pub diagnostics: Vec<StepDiagnostic>,
    /// Local paths of the artifacts that were retrieved or relocated
    pub artifacts: Vec<PathBuf>,
    /// Timing and load settings the run was executed with
    ///
    /// Two runs with the same settings should be comparable.
    pub settings: HashMap<String, String>,
    /// The version of the benchmark runner that was used for this run
    pub runner_version: String,
}

impl RunSummary {
    /// Create a new run summary for a run that has just started
    pub fn new(
        run_id: String,
        profile: String,
        test_type: TestType,
        malicious_percent: Option<u8>,
        started_at: i64,
        runner_version: String,
    ) -> Self {
        Self {
            run_id,
            profile,
            test_type,
            malicious_percent,
            started_at,
            run_duration_ms: 0,
            succeeded: false,
            failure_stage: None,
            final_stage: Stage::Connect,
            diagnostics: Vec::new(),
            artifacts: Vec::new(),
            settings: HashMap::with_capacity(0),
            runner_version,
        }
    }

    /// Add a setting that the run was configured with
    pub fn add_setting(&mut self, key: impl Into<String>, value: impl ToString) {
        self.settings.insert(key.into(), value.to_string());
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to identify runs that were made with the same configuration,
    /// so that their telemetry can be compared. It uses the
    ///     - Profile name
    ///     - Test type
    ///     - Malicious percentage
    ///     - Settings
    ///     - Runner version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.profile.as_bytes());
        Digest::update(&mut hasher, self.test_type.to_string().as_bytes());
        if let Some(percent) = self.malicious_percent {
            Digest::update(&mut hasher, [percent]);
        }
        self.settings
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.runner_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> RunSummary {
        let mut summary = RunSummary::new(
            "abc123".to_string(),
            "dns_throughput_sweep".to_string(),
            TestType::PolicyFilter,
            Some(30),
            1_792_000_000,
            "0.1.0".to_string(),
        );
        summary.add_setting("capture_samples", 60);
        summary.add_setting("restart_settle_ms", 5000);
        summary
    }

    #[test]
    fn test_type_round_trips_through_its_name() {
        for name in TestType::NAMES {
            let test_type: TestType = name.parse().expect("Failed to parse test type");
            assert_eq!(test_type.to_string(), name);
        }
        assert!("dnsfw_ebpf".parse::<TestType>().is_err());
    }

    #[test]
    fn stages_are_ordered_like_the_run() {
        assert!(Stage::Connect < Stage::Elevate);
        assert!(Stage::FetchArtifacts < Stage::Parse);
        assert_eq!(Stage::GenerateLoad.to_string(), "LOAD_GENERATED");
    }

    #[test]
    fn fingerprint_ignores_run_identity() {
        let first = sample_summary();
        let mut second = sample_summary();
        second.run_id = "def456".to_string();
        second.started_at += 600;
        second.succeeded = true;
        second.final_stage = Stage::Done;

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_settings() {
        let first = sample_summary();
        let mut second = sample_summary();
        second.add_setting("restart_settle_ms", 2000);

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn append_and_load_summaries() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("run_summary.jsonl");

        let mut failed = sample_summary();
        failed.failure_stage = Some(Stage::Connect);
        failed
            .diagnostics
            .push(StepDiagnostic::new(Stage::Connect, "connection refused"));

        append_run_summary(&sample_summary(), path.clone()).expect("Failed to append");
        append_run_summary(&failed, path.clone()).expect("Failed to append");

        let runs = load_summary_runs(path).expect("Failed to load");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], sample_summary());
        assert_eq!(runs[1].failure_stage, Some(Stage::Connect));
        assert_eq!(runs[1].final_stage, Stage::Connect);
    }

    #[test]
    fn serializes_test_type_by_name() {
        let mut out = Vec::new();
        store_run_summary(&sample_summary(), &mut out).expect("Failed to store");
        let json = String::from_utf8(out).expect("Not UTF-8");
        assert!(json.contains(r#""test_type":"dnsfw_rpz""#));

        let loaded = load_run_summary(json.as_bytes()).expect("Failed to load");
        assert_eq!(loaded.malicious_percent, Some(30));
    }
}
