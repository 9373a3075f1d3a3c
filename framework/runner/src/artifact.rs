use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use dnsfw_summary_model::TestType;

use crate::params::{ExperimentParameters, MaliciousPercent};

/// Name of the JSON lines file that every run appends its summary to.
pub const RUN_SUMMARY_FILE: &str = "run_summary.jsonl";

/// The suffix that keeps the artifacts of one run apart from the others of the same day.
pub fn run_suffix(test_type: TestType, percent: Option<MaliciousPercent>) -> String {
    match percent {
        Some(percent) => format!("{test_type}_{percent}"),
        None => test_type.to_string(),
    }
}

/// The file name of the request log written by the load tool.
pub fn request_log_name(suffix: &str) -> String {
    format!("requests_l_{suffix}.log")
}

/// The results directory for runs started on `date`.
pub fn results_dir(results_root: &Path, date: NaiveDate) -> PathBuf {
    results_root.join(format!("results_{}", date.format("%Y%m%d")))
}

/// Where the files of one run live, remotely and locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifactSet {
    results_dir: PathBuf,
    capture_remote: PathBuf,
    capture_local: PathBuf,
    csv_local: PathBuf,
    request_log: Option<(PathBuf, PathBuf)>,
}

impl RunArtifactSet {
    pub fn new(parameters: &ExperimentParameters, date: NaiveDate) -> Self {
        let suffix = run_suffix(parameters.test_type, parameters.malicious_percent);
        let results_dir = results_dir(&parameters.results_root, date);

        let request_log = parameters.workload.request_log.as_ref().map(|source| {
            let name = source
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(request_log_name(&suffix)));
            (source.clone(), results_dir.join(name))
        });

        Self {
            capture_remote: parameters
                .remote_dir
                .join(format!("sar_output_{suffix}.txt")),
            capture_local: results_dir.join(format!("sar_output_{suffix}.txt")),
            csv_local: results_dir.join(format!("sar_output_{suffix}.csv")),
            request_log,
            results_dir,
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// The file the remote capture writes to.
    pub fn capture_remote(&self) -> &Path {
        &self.capture_remote
    }

    /// The raw capture once retrieved.
    pub fn capture_local(&self) -> &Path {
        &self.capture_local
    }

    /// The parsed capture.
    pub fn csv_local(&self) -> &Path {
        &self.csv_local
    }

    /// The request log written by the load tool and where it is moved to.
    pub fn request_log(&self) -> Option<(&Path, &Path)> {
        self.request_log
            .as_ref()
            .map(|(from, to)| (from.as_path(), to.as_path()))
    }

    /// Remote files and the local paths they are retrieved to.
    pub fn fetch_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        vec![(self.capture_remote.clone(), self.capture_local.clone())]
    }

    /// Every remote file the run creates.
    pub fn remote_paths(&self) -> Vec<PathBuf> {
        vec![self.capture_remote.clone()]
    }

    /// Local artifact paths that already hold a file, which this run would overwrite.
    ///
    /// Runs are told apart by test type and percentage only, so a different profile run on the
    /// same day writes to the same paths.
    pub fn existing_local_artifacts(&self) -> Vec<&Path> {
        let mut paths = vec![self.capture_local.as_path(), self.csv_local.as_path()];
        if let Some((_, to)) = &self.request_log {
            paths.push(to.as_path());
        }
        paths.into_iter().filter(|path| path.exists()).collect()
    }

    pub fn run_summary_path(&self) -> PathBuf {
        self.results_dir.join(RUN_SUMMARY_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_includes_percent_when_present() {
        let percent = MaliciousPercent::new(30).unwrap();
        assert_eq!(
            run_suffix(TestType::PolicyFilter, Some(percent)),
            "dnsfw_rpz_30"
        );
        assert_eq!(run_suffix(TestType::AcceleratedFilter, None), "dnsfw_xdp");
    }

    #[test]
    fn results_dir_is_dated() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            results_dir(Path::new("/data"), date),
            PathBuf::from("/data/results_20240307")
        );
    }
}
