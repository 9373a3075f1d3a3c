//! An in-memory remote host for testing code that drives a [`Transport`].
//!
//! The fake understands just enough of the command lines sent by [`crate::RemoteControl`] to
//! create, chmod and delete capture files, so that retrieval behaves like it would against a
//! real host.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ChannelError, ConnectionError, TransferError};
use crate::transport::{Connect, HostTarget, RemoteFileStat, Transport};

/// Mode of files created by the remote root shell.
const CREATED_FILE_MODE: u32 = 0o600;

#[derive(Debug, Default)]
struct Behaviour {
    failing_attempts: HashSet<usize>,
    fail_shell: bool,
    capture_content: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct SessionLog {
    lines: Vec<String>,
    closed: usize,
}

#[derive(Debug, Default)]
struct State {
    connect_attempts: usize,
    sessions: Vec<SessionLog>,
    files: HashMap<PathBuf, (Vec<u8>, u32)>,
}

/// A fake remote host, cheap to clone. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    behaviour: Arc<Behaviour>,
    state: Arc<Mutex<State>>,
}

impl FakeHost {
    fn behaviour_mut(&mut self) -> &mut Behaviour {
        Arc::get_mut(&mut self.behaviour).expect("configure the fake host before sharing it")
    }

    /// Refuse the connection attempt with the given zero-based index.
    pub fn fail_connection_attempt(mut self, attempt: usize) -> Self {
        self.behaviour_mut().failing_attempts.insert(attempt);
        self
    }

    /// Fail to open the interactive shell.
    pub fn fail_shell(mut self) -> Self {
        self.behaviour_mut().fail_shell = true;
        self
    }

    /// The report written to the output file of every started capture.
    ///
    /// Without it, captures produce no file.
    pub fn capture_content(mut self, content: &[u8]) -> Self {
        self.behaviour_mut().capture_content = Some(content.to_vec());
        self
    }

    /// The number of times a connection was attempted.
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    /// The number of sessions that were established.
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// The lines sent during the given session.
    pub fn sent_lines(&self, session: usize) -> Vec<String> {
        self.state
            .lock()
            .sessions
            .get(session)
            .map(|s| s.lines.clone())
            .unwrap_or_default()
    }

    /// How many times the given session was closed.
    pub fn close_count(&self, session: usize) -> usize {
        self.state
            .lock()
            .sessions
            .get(session)
            .map(|s| s.closed)
            .unwrap_or_default()
    }

    /// Whether a file currently exists on the fake host.
    pub fn has_file(&self, path: &Path) -> bool {
        self.state.lock().files.contains_key(path)
    }

    /// Put a file on the fake host.
    pub fn put_file(&self, path: impl Into<PathBuf>, content: &[u8], mode: u32) {
        self.state
            .lock()
            .files
            .insert(path.into(), (content.to_vec(), mode));
    }

    fn apply(&self, line: &str) {
        let mut state = self.state.lock();
        if let Some(rest) = line.strip_prefix("sar ") {
            let output = rest
                .split_once("> ")
                .map(|(_, target)| target.trim_end_matches('&').trim());
            if let (Some(output), Some(content)) = (output, &self.behaviour.capture_content) {
                state
                    .files
                    .insert(PathBuf::from(output), (content.clone(), CREATED_FILE_MODE));
            }
        } else if let Some(rest) = line.strip_prefix("chmod ") {
            let mut parts = rest.split_whitespace();
            let mode = parts.next().and_then(|m| u32::from_str_radix(m, 8).ok());
            if let Some(mode) = mode {
                for path in parts {
                    if let Some(file) = state.files.get_mut(Path::new(path)) {
                        file.1 = mode;
                    }
                }
            }
        } else if let Some(rest) = line.strip_prefix("rm -f ") {
            for path in rest.split_whitespace() {
                state.files.remove(Path::new(path));
            }
        }
    }
}

/// Connects to a [`FakeHost`].
#[derive(Debug, Clone)]
pub struct FakeConnector {
    host: FakeHost,
}

impl FakeConnector {
    pub fn new(host: FakeHost) -> Self {
        Self { host }
    }
}

impl Connect for FakeConnector {
    type Transport = FakeTransport;

    fn connect(&self, target: &HostTarget) -> Result<FakeTransport, ConnectionError> {
        let mut state = self.host.state.lock();
        let attempt = state.connect_attempts;
        state.connect_attempts += 1;

        if self.host.behaviour.failing_attempts.contains(&attempt) {
            return Err(ConnectionError::Tcp {
                addr: format!("{}:{}", target.host, target.port),
                timeout: target.timeout,
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ),
            });
        }

        state.sessions.push(SessionLog::default());
        Ok(FakeTransport {
            host: self.host.clone(),
            session: state.sessions.len() - 1,
            shell_open: false,
        })
    }
}

/// A session with a [`FakeHost`].
#[derive(Debug)]
pub struct FakeTransport {
    host: FakeHost,
    session: usize,
    shell_open: bool,
}

impl Transport for FakeTransport {
    fn open_shell(&mut self) -> Result<(), ChannelError> {
        if self.host.behaviour.fail_shell {
            return Err(ChannelError::NotOpen);
        }
        self.shell_open = true;
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        if !self.shell_open {
            return Err(ChannelError::NotOpen);
        }
        self.host.state.lock().sessions[self.session]
            .lines
            .push(line.to_string());
        self.host.apply(line);
        Ok(())
    }

    fn fetch_file(&mut self, remote: &Path, local: &Path) -> Result<u64, TransferError> {
        let content = match self.host.state.lock().files.get(remote) {
            None => {
                return Err(TransferError::RemoteRead {
                    path: remote.to_path_buf(),
                    reason: "No such file".to_string(),
                })
            }
            Some((_, mode)) if mode & 0o004 == 0 => {
                return Err(TransferError::RemoteRead {
                    path: remote.to_path_buf(),
                    reason: "Permission denied".to_string(),
                })
            }
            Some((content, _)) => content.clone(),
        };

        std::fs::write(local, &content).map_err(|source| TransferError::LocalWrite {
            path: local.to_path_buf(),
            source,
        })?;
        Ok(content.len() as u64)
    }

    fn stat(&mut self, remote: &Path) -> Result<Option<RemoteFileStat>, TransferError> {
        Ok(self
            .host
            .state
            .lock()
            .files
            .get(remote)
            .map(|(content, mode)| RemoteFileStat {
                size: content.len() as u64,
                mode: *mode,
            }))
    }

    fn close(&mut self) {
        self.shell_open = false;
        self.host.state.lock().sessions[self.session].closed += 1;
    }
}
