//! Error types for sessions, transports and one-shot execution.
//!
//! Every failure the core can produce is a [`SessionError`]. Connection and
//! authentication failures are returned to the immediate caller; read errors
//! while polling a shell are logged and swallowed by the session itself and
//! never reach this far.
//!
//! # Retry classification
//!
//! [`SessionError::is_retryable`] decides whether the optional connect retry
//! (see `SSH_MAX_RETRIES`) should try again:
//!
//! 1. **Authentication failures are never retried**, to avoid account lockouts.
//! 2. **Timeouts and transient network errors are retried**: connection refused,
//!    reset, unreachable, handshake failures.
//! 3. **Unknown transport messages** are retried unless they look like an SSH
//!    protocol error that does not also mention a timeout or connect problem.

use std::time::Duration;

use thiserror::Error;

use crate::mcp::auth::AuthFailure;

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
];

/// Errors produced by the session manager and its transport.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No host was given and none is configured.
    #[error("No host provided and HOST is not set in the environment or MCP configuration")]
    MissingHost,

    /// TCP connect or SSH handshake failed.
    #[error("Failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    /// Connecting took longer than the configured timeout.
    #[error("Connection to {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    /// Every configured authentication strategy was rejected.
    #[error(
        "Authentication failed for {username}@{host}: {}",
        summarize_failures(.failures)
    )]
    AuthenticationFailure {
        host: String,
        username: String,
        failures: Vec<AuthFailure>,
    },

    /// The session never connected or has been closed.
    #[error("Session for {host} is not connected")]
    NotConnected { host: String },

    /// The registry holds no session for the host.
    #[error("No active session for {host}")]
    NoActiveSession { host: String },

    /// Non-timeout I/O failure while reading a shell stream.
    #[error("Error reading shell output from {host}: {reason}")]
    TransportRead { host: String, reason: String },

    /// The remote side closed the shell channel.
    #[error("Shell channel to {host} was closed by the remote side")]
    ChannelClosed { host: String },

    /// Opening or writing to a channel failed.
    #[error("Channel error on {host}: {reason}")]
    Channel { host: String, reason: String },

    /// Running a one-shot command failed before an exit status was received.
    #[error("Command execution on {host} failed: {reason}")]
    Exec { host: String, reason: String },
}

impl SessionError {
    /// Whether a connect attempt that failed with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Timeout { .. } => true,
            SessionError::Connect { reason, .. } => is_retryable_error(reason),
            _ => false,
        }
    }
}

fn summarize_failures(failures: &[AuthFailure]) -> String {
    if failures.is_empty() {
        return "no authentication methods were attempted".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Classifies a transport error message as transient (`true`) or permanent.
///
/// Authentication patterns are checked first and take precedence, so
/// "timeout during authentication failed" is not retryable.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    if AUTH_ERRORS.iter().any(|p| error_lower.contains(p)) {
        return false;
    }

    if RETRYABLE_ERRORS.iter().any(|p| error_lower.contains(p)) {
        return true;
    }

    // Unknown errors are retried unless they look like an SSH protocol error
    !error_lower.contains("ssh") || error_lower.contains("connect")
}
