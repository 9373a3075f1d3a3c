mod command;
mod control;
mod error;
mod ssh;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{CaptureSpec, RemoteCommand, Secret};
pub use control::{RemoteControl, VerifyPolicy};
pub use error::{ChannelError, ConnectionError, SettleError, TransferError};
pub use ssh::{SshConnector, SshSession};
pub use transport::{Auth, Connect, HostTarget, RemoteFileStat, Transport};

pub mod prelude {
    pub use crate::command::{CaptureSpec, RemoteCommand, Secret};
    pub use crate::control::{RemoteControl, VerifyPolicy};
    pub use crate::error::{ChannelError, ConnectionError, SettleError, TransferError};
    pub use crate::ssh::SshConnector;
    pub use crate::transport::{Auth, Connect, HostTarget, Transport};
}
