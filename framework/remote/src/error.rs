use std::path::PathBuf;
use std::time::Duration;

/// Failure to establish a session with the remote host. A run cannot proceed without one.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },
    #[error("No address found for {0}")]
    NoAddress(String),
    #[error("Failed to connect to {addr} within {timeout:?}: {source}")]
    Tcp {
        addr: String,
        timeout: Duration,
        source: std::io::Error,
    },
    #[error("SSH handshake with {host} failed: {source}")]
    Handshake { host: String, source: ssh2::Error },
    #[error("Authentication as '{username}' failed. Please check username and password.")]
    Authentication {
        username: String,
        #[source]
        source: Option<ssh2::Error>,
    },
    #[error("Failed to open interactive shell: {0}")]
    Shell(#[from] ChannelError),
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),
}

/// Failure to write a command line to the interactive channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("The interactive channel is not open")]
    NotOpen,
    #[error("SSH channel error: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("Failed to write to the interactive channel: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to retrieve or inspect a file on the remote host.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Failed to open SFTP channel: {0}")]
    Sftp(ssh2::Error),
    #[error("Remote file {path} is not readable: {reason}")]
    RemoteRead { path: PathBuf, reason: String },
    #[error("Local file {path} is not writable: {source}")]
    LocalWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure to observe the expected remote state while settling in verified mode.
#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
    #[error(transparent)]
    Transfer(#[from] TransferError),
}
