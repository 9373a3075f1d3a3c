use std::io::Write as _;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use ssh2::{Channel, ErrorCode, Session, Sftp};

use crate::error::{ChannelError, ConnectionError, TransferError};
use crate::transport::{Auth, Connect, HostTarget, RemoteFileStat, Transport};

/// `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Terminal type requested for the interactive shell.
const PTY_TERM: &str = "vt100";

/// Connects to hosts over SSH with libssh2.
///
/// Host keys are accepted without verification, the benchmark runs against lab machines.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl Connect for SshConnector {
    type Transport = SshSession;

    fn connect(&self, target: &HostTarget) -> Result<SshSession, ConnectionError> {
        let mut addrs = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                host: target.host.clone(),
                port: target.port,
                source,
            })?;
        let addr = addrs
            .next()
            .ok_or_else(|| ConnectionError::NoAddress(target.host.clone()))?;

        let tcp = TcpStream::connect_timeout(&addr, target.timeout).map_err(|source| {
            ConnectionError::Tcp {
                addr: addr.to_string(),
                timeout: target.timeout,
                source,
            }
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(target.timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|source| ConnectionError::Handshake {
                host: target.host.clone(),
                source,
            })?;

        let auth_result = match &target.auth {
            Auth::Password(password) => session.userauth_password(&target.username, password),
            Auth::KeyFile {
                private_key,
                passphrase,
            } => session.userauth_pubkey_file(
                &target.username,
                None,
                private_key,
                passphrase.as_deref(),
            ),
        };
        if let Err(source) = auth_result {
            return Err(ConnectionError::Authentication {
                username: target.username.clone(),
                source: Some(source),
            });
        }
        if !session.authenticated() {
            return Err(ConnectionError::Authentication {
                username: target.username.clone(),
                source: None,
            });
        }

        log::debug!("Authenticated to {} as {}", addr, target.username);

        Ok(SshSession {
            session,
            shell: None,
            sftp: None,
        })
    }
}

/// A session with one host: an interactive shell for commands and SFTP for files.
pub struct SshSession {
    session: Session,
    shell: Option<Channel>,
    sftp: Option<Sftp>,
}

impl SshSession {
    fn sftp(&mut self) -> Result<&Sftp, TransferError> {
        let sftp = match self.sftp.take() {
            Some(sftp) => sftp,
            None => self.session.sftp().map_err(TransferError::Sftp)?,
        };
        Ok(&*self.sftp.insert(sftp))
    }
}

impl Transport for SshSession {
    fn open_shell(&mut self) -> Result<(), ChannelError> {
        let mut channel = self.session.channel_session()?;
        channel.request_pty(PTY_TERM, None, None)?;
        channel.shell()?;
        self.shell = Some(channel);
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let shell = self.shell.as_mut().ok_or(ChannelError::NotOpen)?;
        shell.write_all(line.as_bytes())?;
        shell.write_all(b"\n")?;
        shell.flush()?;
        Ok(())
    }

    fn fetch_file(&mut self, remote: &Path, local: &Path) -> Result<u64, TransferError> {
        let mut remote_file =
            self.sftp()?
                .open(remote)
                .map_err(|e| TransferError::RemoteRead {
                    path: remote.to_path_buf(),
                    reason: e.message().to_string(),
                })?;
        let mut local_file =
            std::fs::File::create(local).map_err(|source| TransferError::LocalWrite {
                path: local.to_path_buf(),
                source,
            })?;

        std::io::copy(&mut remote_file, &mut local_file).map_err(|source| TransferError::Copy {
            path: remote.to_path_buf(),
            source,
        })
    }

    fn stat(&mut self, remote: &Path) -> Result<Option<RemoteFileStat>, TransferError> {
        match self.sftp()?.stat(remote) {
            Ok(stat) => Ok(Some(RemoteFileStat {
                size: stat.size.unwrap_or_default(),
                mode: stat.perm.unwrap_or_default() & 0o7777,
            })),
            Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => Ok(None),
            Err(e) => Err(TransferError::RemoteRead {
                path: remote.to_path_buf(),
                reason: e.message().to_string(),
            }),
        }
    }

    fn close(&mut self) {
        self.sftp.take();
        if let Some(mut shell) = self.shell.take() {
            if let Err(e) = shell.send_eof().and_then(|_| shell.close()) {
                log::debug!("Failed to close interactive shell cleanly: {e}");
            }
        }
        if let Err(e) = self
            .session
            .disconnect(None, "benchmark run finished", None)
        {
            log::debug!("Failed to disconnect cleanly: {e}");
        }
    }
}
