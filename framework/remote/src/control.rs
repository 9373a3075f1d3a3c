use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::command::{CaptureSpec, RemoteCommand, Secret};
use crate::error::{ChannelError, SettleError, TransferError};
use crate::transport::{RemoteFileStat, Transport};

/// Bounds for polling the remote side while settling in verified mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Give up after this long.
    pub timeout: Duration,
    /// Time between two checks.
    pub poll_interval: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Typed commands for the remote benchmark host on top of a [`Transport`].
///
/// Commands don't wait for the remote shell to finish them, there is no way to tell from the
/// shell. Callers follow each command with [`RemoteControl::settle`] or, where the effect is
/// visible over SFTP, one of the `wait_for_*` methods.
///
/// The session is closed exactly once, either by [`RemoteControl::close`] or when dropped.
pub struct RemoteControl<T: Transport> {
    transport: T,
    host: String,
    closed: bool,
}

impl<T: Transport> RemoteControl<T> {
    /// Open the interactive shell on a connected transport.
    ///
    /// The transport is closed if the shell can't be opened.
    pub fn open(mut transport: T, host: impl Into<String>) -> Result<Self, ChannelError> {
        if let Err(e) = transport.open_shell() {
            transport.close();
            return Err(e);
        }

        Ok(Self {
            transport,
            host: host.into(),
            closed: false,
        })
    }

    /// Send a command line to the remote shell.
    pub fn send(&mut self, command: &RemoteCommand) -> Result<(), ChannelError> {
        log::debug!("[{}] $ {command}", self.host);
        self.transport.send_line(&command.shell_line())
    }

    /// Become root.
    pub fn elevate(&mut self) -> Result<(), ChannelError> {
        self.send(&RemoteCommand::Elevate)
    }

    /// Type a secret at a prompt, such as the one `sudo` shows.
    pub fn answer_prompt(&mut self, secret: &Secret) -> Result<(), ChannelError> {
        self.send(&RemoteCommand::Secret(secret.clone()))
    }

    /// Restart a systemd unit with the given `systemctl` binary.
    pub fn restart_service(&mut self, systemctl: &str, unit: &str) -> Result<(), ChannelError> {
        self.send(&RemoteCommand::RestartService {
            systemctl: systemctl.to_string(),
            unit: unit.to_string(),
        })
    }

    /// Start a background CPU capture.
    pub fn start_capture(&mut self, capture: &CaptureSpec) -> Result<(), ChannelError> {
        self.send(&RemoteCommand::StartCapture(capture.clone()))
    }

    /// Change the permission bits of remote files.
    pub fn set_permissions(&mut self, paths: &[PathBuf], mode: u32) -> Result<(), ChannelError> {
        self.send(&RemoteCommand::SetPermissions {
            mode,
            paths: paths.to_vec(),
        })
    }

    /// Delete remote files.
    pub fn remove(&mut self, paths: &[PathBuf]) -> Result<(), ChannelError> {
        self.send(&RemoteCommand::Remove {
            paths: paths.to_vec(),
        })
    }

    /// Copy a remote file to the local machine.
    pub fn fetch_file(&mut self, remote: &Path, local: &Path) -> Result<u64, TransferError> {
        self.transport.fetch_file(remote, local)
    }

    /// Wait a fixed time for the previous command to take effect.
    pub fn settle(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        log::trace!("[{}] settling for {delay:?}", self.host);
        std::thread::sleep(delay);
    }

    /// Poll until the remote file exists.
    pub fn wait_for_file(
        &mut self,
        remote: &Path,
        policy: &VerifyPolicy,
    ) -> Result<RemoteFileStat, SettleError> {
        self.poll(policy, &format!("{} to exist", remote.display()), |t| {
            t.stat(remote)
        })
    }

    /// Poll until the remote file exists with exactly the given permission bits.
    pub fn wait_for_mode(
        &mut self,
        remote: &Path,
        mode: u32,
        policy: &VerifyPolicy,
    ) -> Result<RemoteFileStat, SettleError> {
        self.poll(
            policy,
            &format!("{} to have mode {mode:o}", remote.display()),
            |t| Ok(t.stat(remote)?.filter(|stat| stat.mode == mode)),
        )
    }

    fn poll<F>(
        &mut self,
        policy: &VerifyPolicy,
        what: &str,
        mut check: F,
    ) -> Result<RemoteFileStat, SettleError>
    where
        F: FnMut(&mut T) -> Result<Option<RemoteFileStat>, TransferError>,
    {
        let started = Instant::now();
        loop {
            if let Some(stat) = check(&mut self.transport)? {
                log::trace!("[{}] {what} after {:?}", self.host, started.elapsed());
                return Ok(stat);
            }
            if started.elapsed() >= policy.timeout {
                return Err(SettleError::Timeout {
                    what: what.to_string(),
                    waited: started.elapsed(),
                });
            }
            std::thread::sleep(policy.poll_interval);
        }
    }

    /// Close the session.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.transport.close();
        log::info!("SSH connection to {} closed.", self.host);
    }
}

impl<T: Transport> Drop for RemoteControl<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
