//! russh implementation of the transport traits.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: Build the russh client configuration with timeout,
//!    keepalive, and compression settings. Interactive sessions are persistent
//!    and have no inactivity timeout.
//!
//! 2. **Connection Establishment**: TCP connect and SSH handshake, bounded by the
//!    connect timeout.
//!
//! 3. **Authentication**: Password first (if one was resolved), then the private
//!    key file. Every failure is kept for the final error.
//!
//! 4. **Use**: either an interactive shell (PTY + shell request) or a one-shot
//!    exec that collects stdout, stderr and the exit status.
//!
//! ## Retry Strategy
//!
//! Connect attempts can be retried with exponential backoff and jitter via the
//! `backon` crate. Retries are off unless `SSH_MAX_RETRIES` says otherwise.
//!
//! - **Initial delay**: `SSH_RETRY_DELAY_MS` (default: 1000ms)
//! - **Maximum delay**: Capped at [`MAX_RETRY_DELAY`] (10 seconds)
//! - **Retryable**: Connection refused, timeout, network unreachable, broken pipe
//! - **Non-retryable**: Authentication failures, to avoid account lockouts

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use russh::{ChannelMsg, Disconnect, client};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::mcp::auth::{AuthChain, AuthHandle};
use crate::mcp::config::{
    MAX_RETRY_DELAY, resolve_compression, resolve_connect_timeout, resolve_max_retries,
    resolve_retry_delay,
};
use crate::mcp::error::SessionError;
use crate::mcp::session::SshClientHandler;
use crate::mcp::transport::{ConnectionTarget, Connector, RemoteConnection, ShellStream};
use crate::mcp::types::CommandOutput;

/// Terminal type requested for interactive shells
const PTY_TERM: &str = "xterm";
const PTY_COLUMNS: u32 = 160;
const PTY_ROWS: u32 = 48;

/// Connection tunables for [`RusshConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub compress: bool,
    /// Disable the inactivity timeout (interactive sessions)
    pub persistent: bool,
}

impl ConnectSettings {
    /// Settings from the environment, see [`crate::mcp::config`].
    pub fn from_env(persistent: bool) -> Self {
        Self {
            timeout: resolve_connect_timeout(None),
            max_retries: resolve_max_retries(None),
            retry_delay: resolve_retry_delay(None),
            compress: resolve_compression(None),
            persistent,
        }
    }
}

/// Build russh client configuration with the specified settings.
///
/// - Inactivity timeout set to `timeout` (or `None` if `persistent` is true)
/// - Keepalive interval of 30 seconds with max 3 keepalives
/// - Compression preference based on `compress` (ZLIB if enabled, NONE if disabled)
pub(crate) fn build_client_config(
    timeout: Duration,
    compress: bool,
    persistent: bool,
) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    let inactivity_timeout = if persistent { None } else { Some(timeout) };

    Arc::new(client::Config {
        inactivity_timeout,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Password first, then the key file.
pub(crate) fn build_auth_chain(password: Option<&str>, key_path: Option<&Path>) -> AuthChain {
    let mut chain = AuthChain::new();

    if let Some(password) = password {
        chain = chain.with_password(password);
    }

    if let Some(key_path) = key_path {
        chain = chain.with_key(key_path);
    }

    chain
}

/// Connect with optional retries using exponential backoff with jitter.
async fn connect_with_retry(
    target: &ConnectionTarget,
    settings: &ConnectSettings,
) -> Result<client::Handle<SshClientHandler>, SessionError> {
    let attempt_counter = AtomicU32::new(0);

    let backoff = ExponentialBuilder::default()
        .with_min_delay(settings.retry_delay)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(settings.max_retries as usize)
        .with_jitter();

    let result = (|| async {
        let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);

        if current_attempt > 0 {
            warn!(
                "SSH connection retry attempt {} to {}@{}",
                current_attempt,
                target.username,
                target.address()
            );
        }

        connect_to_ssh(target, settings).await
    })
    .retry(backoff)
    .when(|e: &SessionError| {
        let retryable = e.is_retryable();
        if !retryable && settings.max_retries > 0 {
            warn!(
                "SSH connection to {}@{} failed with non-retryable error: {}",
                target.username,
                target.address(),
                e
            );
        }
        retryable
    })
    .notify(|err: &SessionError, dur: Duration| {
        warn!("SSH connection failed: {}. Retrying in {:?}", err, dur);
    })
    .await;

    let total_attempts = attempt_counter.load(Ordering::SeqCst);

    match result {
        Ok(handle) => {
            if total_attempts > 1 {
                info!(
                    "SSH connection to {}@{} succeeded after {} retry attempt(s)",
                    target.username,
                    target.address(),
                    total_attempts - 1
                );
            }
            Ok(handle)
        }
        Err(e) => {
            error!(
                "SSH connection to {}@{} failed after {} attempt(s). Last error: {}",
                target.username,
                target.address(),
                total_attempts,
                e
            );
            Err(e)
        }
    }
}

/// Establish an SSH connection and authenticate through an [`AuthChain`].
async fn connect_to_ssh(
    target: &ConnectionTarget,
    settings: &ConnectSettings,
) -> Result<client::Handle<SshClientHandler>, SessionError> {
    let config = build_client_config(settings.timeout, settings.compress, settings.persistent);

    let connect_future = client::connect(
        config,
        (target.host.as_str(), target.port),
        SshClientHandler,
    );

    let mut handle = tokio::time::timeout(settings.timeout, connect_future)
        .await
        .map_err(|_| SessionError::Timeout {
            host: target.host.clone(),
            timeout: settings.timeout,
        })?
        .map_err(|e| SessionError::Connect {
            host: target.host.clone(),
            reason: e.to_string(),
        })?;

    authenticate_target(&mut handle, target).await?;
    Ok(handle)
}

/// Log in as `target.username`, password first, then the key file.
///
/// Returns the strategy that was accepted. When every strategy fails the
/// error carries each one's cause.
pub(crate) async fn authenticate_target(
    handle: &mut dyn AuthHandle,
    target: &ConnectionTarget,
) -> Result<&'static str, SessionError> {
    let auth_chain = build_auth_chain(target.password.as_deref(), target.key_path.as_deref());

    match auth_chain.authenticate(handle, &target.username).await {
        Ok(strategy) => {
            debug!(
                "Authenticated {}@{} using {}",
                target.username,
                target.address(),
                strategy
            );
            Ok(strategy)
        }
        Err(failures) => Err(SessionError::AuthenticationFailure {
            host: target.host.clone(),
            username: target.username.clone(),
            failures,
        }),
    }
}

/// Opens russh connections.
pub struct RusshConnector {
    settings: ConnectSettings,
}

impl RusshConnector {
    pub fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteConnection>, SessionError> {
        let handle = connect_with_retry(target, &self.settings).await?;
        info!("Connected to {}@{}", target.username, target.address());

        Ok(Box::new(RusshConnection {
            host: target.host.clone(),
            handle,
        }))
    }
}

struct RusshConnection {
    host: String,
    handle: client::Handle<SshClientHandler>,
}

impl RusshConnection {
    fn channel_error(&self, what: &str, e: russh::Error) -> SessionError {
        SessionError::Channel {
            host: self.host.clone(),
            reason: format!("{}: {}", what, e),
        }
    }
}

#[async_trait]
impl RemoteConnection for RusshConnection {
    async fn open_shell(&self) -> Result<Box<dyn ShellStream>, SessionError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.channel_error("Failed to open channel", e))?;

        channel
            .request_pty(true, PTY_TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await
            .map_err(|e| self.channel_error("Failed to request PTY", e))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| self.channel_error("Failed to request shell", e))?;

        Ok(Box::new(RusshShell {
            host: self.host.clone(),
            channel,
        }))
    }

    /// On timeout, returns the partial output with `timed_out: true` and
    /// `exit_code: -1`. Returns -1 as exit code if the server never sends one.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput, SessionError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.channel_error("Failed to open channel", e))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Exec {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        let mut stdout = Vec::with_capacity(4096);
        let mut stderr = Vec::with_capacity(1024);
        let mut exit_code: Option<u32> = None;

        let result = tokio::time::timeout(timeout, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.extend_from_slice(&data);
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        // ext == 1 is stderr in SSH protocol
                        if ext == 1 {
                            stderr.extend_from_slice(&data);
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        exit_code = Some(exit_status);
                    }
                    Some(ChannelMsg::Eof) => {
                        // Exit status may still follow EOF
                        if exit_code.is_some() {
                            break;
                        }
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        })
        .await;

        let timed_out = result.is_err();
        if timed_out {
            warn!(
                "Command timed out after {:?} on {}, returning partial output ({} bytes stdout, {} bytes stderr)",
                timeout,
                self.host,
                stdout.len(),
                stderr.len()
            );
        }

        let _ = channel.close().await;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: exit_code.map(|c| c as i32).unwrap_or(-1),
            timed_out,
        })
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "Session closed", "en")
            .await
            .map_err(|e| self.channel_error("Failed to disconnect", e))
    }
}

struct RusshShell {
    host: String,
    channel: russh::Channel<client::Msg>,
}

impl RusshShell {
    fn closed(&self) -> SessionError {
        SessionError::ChannelClosed {
            host: self.host.clone(),
        }
    }
}

#[async_trait]
impl ShellStream for RusshShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SessionError::Channel {
                host: self.host.clone(),
                reason: format!("Failed to write to shell: {}", e),
            })
    }

    async fn read(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match tokio::time::timeout(remaining, self.channel.wait()).await {
                Err(_) => return Ok(None),
                Ok(Some(ChannelMsg::Data { data })) => return Ok(Some(data.to_vec())),
                // A PTY merges stderr into stdout; anything on ext channels is shown too
                Ok(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    return Ok(Some(data.to_vec()));
                }
                Ok(Some(ChannelMsg::Eof | ChannelMsg::Close)) | Ok(None) => {
                    return Err(self.closed());
                }
                Ok(Some(other)) => {
                    debug!("Ignoring shell channel message on {}: {:?}", self.host, other);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.channel
            .close()
            .await
            .map_err(|e| SessionError::Channel {
                host: self.host.clone(),
                reason: format!("Failed to close shell: {}", e),
            })
    }
}
