use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ChannelError, ConnectionError, TransferError};

/// How to authenticate with the remote host.
#[derive(Clone)]
pub enum Auth {
    Password(String),
    KeyFile {
        private_key: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password(_) => f.write_str("Password(********)"),
            Auth::KeyFile { private_key, .. } => f
                .debug_struct("KeyFile")
                .field("private_key", private_key)
                .finish_non_exhaustive(),
        }
    }
}

/// The remote host and the credentials to log in with.
#[derive(Debug, Clone)]
pub struct HostTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: Auth,
    /// Applies to the TCP connect and to each blocking SSH operation afterwards.
    pub timeout: Duration,
}

impl HostTarget {
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: Auth) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the SSH port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Attributes of a remote file, as far as the benchmark cares about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFileStat {
    pub size: u64,
    /// Permission bits, without the file type.
    pub mode: u32,
}

/// The channels of one session with a remote host.
///
/// An interactive shell carries commands, nothing is read back from it. A separate transfer
/// channel retrieves files.
pub trait Transport {
    /// Open the interactive shell that [`Transport::send_line`] writes to.
    fn open_shell(&mut self) -> Result<(), ChannelError>;

    /// Write `line` followed by a line terminator to the shell.
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError>;

    /// Copy a remote file to `local`, replacing it. Returns the number of bytes copied.
    fn fetch_file(&mut self, remote: &Path, local: &Path) -> Result<u64, TransferError>;

    /// Look up a remote file. Returns `None` if it doesn't exist.
    fn stat(&mut self, remote: &Path) -> Result<Option<RemoteFileStat>, TransferError>;

    /// Tear down the session. Must not fail.
    fn close(&mut self);
}

/// Creates sessions with a remote host.
pub trait Connect {
    type Transport: Transport;

    fn connect(&self, target: &HostTarget) -> Result<Self::Transport, ConnectionError>;
}
