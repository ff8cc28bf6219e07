//! Transport abstraction between sessions and the SSH library.
//!
//! [`Connector`] opens authenticated connections, [`RemoteConnection`] offers
//! the two ways of running something remotely (an interactive shell or a
//! one-shot exec) and [`ShellStream`] is the byte pipe to a live shell.
//! The russh implementation lives in [`crate::mcp::client`]; tests use the
//! scripted implementation in `mock`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::mcp::error::SessionError;
use crate::mcp::types::CommandOutput;

#[cfg(test)]
pub(crate) mod mock;

/// Fully resolved connection parameters for one host.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_path", &self.key_path)
            .finish()
    }
}

impl ConnectionTarget {
    /// `host:port`, as passed to the socket layer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteConnection>, SessionError>;
}

/// An authenticated connection to one host.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Request a PTY and an interactive shell on a new channel.
    async fn open_shell(&self) -> Result<Box<dyn ShellStream>, SessionError>;

    /// Run one command on a new channel, collecting output until exit or `timeout`.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput, SessionError>;

    /// Disconnect. Errors are reported but the connection is unusable afterwards either way.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Byte stream to an interactive shell.
#[async_trait]
pub trait ShellStream: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;

    /// Wait at most `wait` for the next chunk.
    ///
    /// `Ok(None)` means nothing arrived in time, which is normal.
    /// A closed channel is reported as [`SessionError::ChannelClosed`].
    async fn read(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}
