//! Value types shared by sessions, the registry and the tool layer.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Result of a one-shot command run over a fresh connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the command timed out before reporting a status
    pub exit_code: i32,
    /// Whether the command timed out (partial output may be available)
    pub timed_out: bool,
}

/// Result of running a command inside an interactive shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellExecution {
    pub output: String,
    /// `false` when the timeout elapsed before completion was detected
    pub completed: bool,
    /// Only known when completion is detected with a sentinel
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Lifecycle of an interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
        }
    }
}

/// What a session publishes on its watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

impl SessionStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            connected_at: None,
            last_activity: Utc::now(),
        }
    }
}

/// Read-only view of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// How [`crate::mcp::registry::SessionRegistry::get_or_create`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Created,
    Reused,
    Reconnected,
}
