use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A `sar` CPU utilization capture written to a file on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSpec {
    /// Where `sar` redirects its report.
    pub output: PathBuf,
    /// Seconds between samples.
    pub interval_secs: u64,
    /// Number of samples before `sar` exits.
    pub samples: u64,
}

impl CaptureSpec {
    /// The length of the capture window.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.interval_secs * self.samples)
    }
}

/// The commands the benchmark sends to the remote shell.
///
/// Commands are rendered to a single shell line with [`RemoteCommand::shell_line`]. Paths are
/// quoted, so callers never build shell text themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Become root with `sudo su -`.
    Elevate,
    /// Answer a password prompt. Never shown in logs.
    Secret(Secret),
    /// Restart a systemd unit.
    RestartService { systemctl: String, unit: String },
    /// Start a CPU capture in the background so the shell stays usable.
    StartCapture(CaptureSpec),
    /// Change the mode of files so they can be read over SFTP.
    SetPermissions { mode: u32, paths: Vec<PathBuf> },
    /// Delete files, ignoring missing ones.
    Remove { paths: Vec<PathBuf> },
}

impl RemoteCommand {
    /// The exact text written to the remote shell, without the line terminator.
    pub fn shell_line(&self) -> String {
        match self {
            RemoteCommand::Secret(secret) => secret.0.clone(),
            other => other.render(),
        }
    }

    fn render(&self) -> String {
        match self {
            RemoteCommand::Elevate => "sudo su -".to_string(),
            RemoteCommand::Secret(_) => "********".to_string(),
            RemoteCommand::RestartService { systemctl, unit } => {
                format!(
                    "{} restart {}",
                    shellwords::escape(systemctl),
                    shellwords::escape(unit)
                )
            }
            RemoteCommand::StartCapture(capture) => format!(
                "sar -u ALL -P ALL {} -t {} > {} &",
                capture.interval_secs,
                capture.samples,
                quote_path(&capture.output)
            ),
            RemoteCommand::SetPermissions { mode, paths } => {
                format!("chmod {mode:o} {}", quote_paths(paths))
            }
            RemoteCommand::Remove { paths } => format!("rm -f {}", quote_paths(paths)),
        }
    }
}

/// Text typed at a password prompt.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn quote_path(path: &Path) -> String {
    shellwords::escape(&path.to_string_lossy())
}

fn quote_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| quote_path(p))
        .collect::<Vec<_>>()
        .join(" ")
}
