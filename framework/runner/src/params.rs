use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dnsfw_remote::{HostTarget, Secret};
use dnsfw_summary_model::TestType;

use crate::workload::{Profile, Workload};

/// The share of malicious domains in the query list, one of 10, 20, ..., 90.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaliciousPercent(u8);

impl MaliciousPercent {
    /// Every valid percentage, in ascending order.
    pub fn all() -> Vec<MaliciousPercent> {
        (1..=9).map(|step| MaliciousPercent(step * 10)).collect()
    }

    pub fn new(value: u8) -> Result<Self, InvalidPercent> {
        if (10..=90).contains(&value) && value % 10 == 0 {
            Ok(Self(value))
        } else {
            Err(InvalidPercent(value.to_string()))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for MaliciousPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MaliciousPercent {
    type Err = InvalidPercent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u8>()
            .map_err(|_| InvalidPercent(s.to_string()))?;
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid malicious percentage '{0}', expected one of 10, 20, 30, 40, 50, 60, 70, 80, 90")]
pub struct InvalidPercent(pub String);

/// Waits after the remote commands whose settle time doesn't depend on the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTimings {
    pub shell_open: Duration,
    pub elevate: Duration,
    pub password: Duration,
    pub chmod: Duration,
    pub post_relocate: Duration,
}

/// Everything one run needs. Built once per run and never changed while it executes.
#[derive(Debug, Clone)]
pub struct ExperimentParameters {
    pub profile: Profile,
    pub test_type: TestType,
    pub malicious_percent: Option<MaliciousPercent>,
    pub target: HostTarget,
    /// Typed at the `sudo` prompt when the workload elevates with a password.
    pub elevation_secret: Option<Secret>,
    pub workload: Workload,
    pub timing: SettleTimings,
    pub capture_interval_secs: u64,
    /// Where capture files are written on the remote host.
    pub remote_dir: PathBuf,
    /// Parent of the dated results directories.
    pub results_root: PathBuf,
}

impl ExperimentParameters {
    /// A short label for logs, such as `dnsfw_rpz 30%`.
    pub fn label(&self) -> String {
        match self.malicious_percent {
            Some(percent) => format!("{} {percent}%", self.test_type),
            None => self.test_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_steps_of_ten() {
        assert_eq!(MaliciousPercent::new(10).unwrap().get(), 10);
        assert_eq!("90".parse::<MaliciousPercent>().unwrap().get(), 90);
        assert_eq!(
            MaliciousPercent::all()
                .iter()
                .map(|p| p.get())
                .collect::<Vec<_>>(),
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90]
        );
    }

    #[test]
    fn rejects_other_values() {
        for value in [0, 5, 15, 95, 100] {
            assert!(MaliciousPercent::new(value).is_err(), "{value} accepted");
        }
        assert_eq!(
            "abc".parse::<MaliciousPercent>(),
            Err(InvalidPercent("abc".to_string()))
        );
    }
}
