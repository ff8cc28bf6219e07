//! Persistent interactive shell sessions.
//!
//! An [`InteractiveSession`] owns one authenticated connection and one PTY
//! shell on it. Commands are typed into the shell, so working directory,
//! environment and shell variables persist between calls.
//!
//! Reads never block for long: each read waits at most `read_wait`, and every
//! polling loop is bounded by a deadline. Transport errors while reading are
//! logged and swallowed. A channel closed by the remote side marks the
//! session `Disconnected` so the registry reconnects it on next use.
//!
//! State changes and activity are published on a `watch` channel
//! ([`InteractiveSession::subscribe`]), which is how the registry lists
//! sessions without locking them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::mcp::completion::{CompletionMarker, CompletionMode, looks_like_prompt};
use crate::mcp::config::resolve_completion_mode;
use crate::mcp::error::SessionError;
use crate::mcp::transport::{ConnectionTarget, Connector, RemoteConnection, ShellStream};
use crate::mcp::types::{SessionState, SessionStatus, ShellExecution};

/// Longest a single read waits for data
pub const READ_WAIT: Duration = Duration::from_millis(100);

/// Sleep between polls while waiting for a command
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause after opening the shell, before flushing the login banner
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for one `read_available` call on a shell that never goes quiet
pub const MAX_DRAIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub read_wait: Duration,
    pub poll_interval: Duration,
    pub settle: Duration,
    pub max_drain: Duration,
    pub completion: CompletionMode,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            read_wait: READ_WAIT,
            poll_interval: POLL_INTERVAL,
            settle: SETTLE_DELAY,
            max_drain: MAX_DRAIN,
            completion: CompletionMode::default(),
        }
    }
}

impl ShellSettings {
    pub fn from_env() -> Self {
        Self {
            completion: resolve_completion_mode(None),
            ..Default::default()
        }
    }
}

/// A persistent shell on one host.
pub struct InteractiveSession {
    target: ConnectionTarget,
    connector: Arc<dyn Connector>,
    settings: ShellSettings,
    connection: Option<Box<dyn RemoteConnection>>,
    shell: Option<Box<dyn ShellStream>>,
    /// Chunks read since the last command was sent
    output_buffer: Vec<String>,
    status: watch::Sender<SessionStatus>,
}

impl InteractiveSession {
    pub fn new(
        target: ConnectionTarget,
        connector: Arc<dyn Connector>,
        settings: ShellSettings,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::new());
        Self {
            target,
            connector,
            settings,
            connection: None,
            shell: None,
            output_buffer: Vec::new(),
            status,
        }
    }

    pub fn host(&self) -> &str {
        &self.target.host
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Use different credentials on the next [`connect`](Self::connect).
    pub fn retarget(&mut self, target: ConnectionTarget) {
        self.target = target;
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected && self.shell.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Output read since the last command was sent (or since connect).
    pub fn buffered_output(&self) -> String {
        self.output_buffer.concat()
    }

    /// Authenticate, open a shell and flush the login banner.
    ///
    /// Any handles left from an earlier connection are released first. On
    /// failure the session is `Disconnected` and may be connected again.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        self.release().await;
        self.set_state(SessionState::Connecting);
        info!(
            "Opening interactive session to {}@{}",
            self.target.username,
            self.target.address()
        );

        let connection = match self.connector.connect(&self.target).await {
            Ok(connection) => connection,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                warn!("Interactive session to {} failed to connect: {}", self.host(), e);
                return Err(e);
            }
        };

        let shell = match connection.open_shell().await {
            Ok(shell) => shell,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!("Error closing connection to {}: {}", self.host(), close_err);
                }
                self.set_state(SessionState::Disconnected);
                warn!("Failed to open shell on {}: {}", self.host(), e);
                return Err(e);
            }
        };

        self.connection = Some(connection);
        self.shell = Some(shell);
        self.output_buffer.clear();
        self.set_state(SessionState::Connected);

        tokio::time::sleep(self.settings.settle).await;
        let banner = self.read_available().await;
        debug!(
            "Flushed {} bytes of login output from {}",
            banner.len(),
            self.host()
        );

        Ok(())
    }

    /// Everything the shell has produced that can be read without waiting.
    pub async fn read_available(&mut self) -> String {
        let deadline = Instant::now() + self.settings.max_drain;
        self.read_until(deadline).await
    }

    /// Drain chunks until a read comes back empty or `deadline` passes.
    async fn read_until(&mut self, deadline: Instant) -> String {
        let mut collected = Vec::new();
        let mut closed = false;

        if let Some(shell) = self.shell.as_mut() {
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                match shell.read(self.settings.read_wait.min(remaining)).await {
                    Ok(Some(chunk)) => collected.extend_from_slice(&chunk),
                    Ok(None) => break,
                    Err(SessionError::ChannelClosed { .. }) => {
                        closed = true;
                        break;
                    }
                    Err(e) => {
                        warn!("{}", e);
                        break;
                    }
                }
            }
        }

        let text = String::from_utf8_lossy(&collected).into_owned();
        if !text.is_empty() {
            self.output_buffer.push(text.clone());
            self.touch();
        }

        if closed {
            warn!(
                "Shell on {} was closed by the remote side, marking session disconnected",
                self.host()
            );
            self.release().await;
            self.set_state(SessionState::Disconnected);
        }

        text
    }

    /// Type `command` into the shell and collect its output.
    ///
    /// Returns within `timeout` (plus at most one read wait). Running out of
    /// time is not an error: the partial output comes back with
    /// `completed = false`.
    pub async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<ShellExecution, SessionError> {
        self.ensure_connected()?;

        let started = Instant::now();
        let deadline = started + timeout;

        // Leftovers belong to whatever ran before
        let stale = self
            .read_until(started + self.settings.read_wait.min(timeout))
            .await;
        if !stale.is_empty() {
            debug!(
                "Discarded {} bytes of pending output on {}",
                stale.len(),
                self.host()
            );
        }
        self.ensure_connected()?;
        self.output_buffer.clear();

        let marker = match self.settings.completion {
            CompletionMode::Sentinel => Some(CompletionMarker::new()),
            CompletionMode::Prompt => None,
        };
        let payload = match &marker {
            Some(marker) => marker.wrap(command),
            None => format!("{command}\n"),
        };
        self.write(payload.as_bytes()).await?;
        debug!("Sent command to {}: {}", self.host(), command);

        let mut output = String::new();
        let mut exit_code = None;
        let mut completed = false;

        loop {
            output.push_str(&self.read_until(deadline).await);

            match &marker {
                Some(marker) => {
                    exit_code = marker.find_exit_code(&output);
                    completed = exit_code.is_some();
                }
                None => completed = looks_like_prompt(&output),
            }
            if completed || !self.is_connected() {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }

        if !completed {
            info!(
                "Command on {} not finished after {:?}, returning partial output",
                self.host(),
                timeout
            );
        }

        let output = match &marker {
            Some(marker) => marker.strip(&output),
            None => output,
        };

        Ok(ShellExecution {
            output,
            completed,
            exit_code,
            elapsed: started.elapsed(),
        })
    }

    /// Send a line of input (answers to prompts, keystrokes) without waiting for output.
    pub async fn send_input(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.write(format!("{text}\n").as_bytes()).await
    }

    /// Collect whatever the shell prints during `duration`.
    pub async fn drain_real_time(&mut self, duration: Duration) -> Result<String, SessionError> {
        self.ensure_connected()?;

        let deadline = Instant::now() + duration;
        let mut output = String::new();

        loop {
            output.push_str(&self.read_until(deadline).await);
            if !self.is_connected() {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }

        Ok(output)
    }

    /// Close the shell and the connection. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        let was_open = self.connection.is_some();
        self.release().await;
        self.set_state(SessionState::Disconnected);
        if was_open {
            info!("Interactive session to {} closed", self.host());
        }
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SessionError::NotConnected {
                host: self.target.host.clone(),
            })
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let shell = self
            .shell
            .as_mut()
            .ok_or_else(|| SessionError::NotConnected {
                host: self.target.host.clone(),
            })?;

        match shell.write(data).await {
            Ok(()) => {
                self.touch();
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Write to shell on {} failed, marking session disconnected: {}",
                    self.host(),
                    e
                );
                self.release().await;
                self.set_state(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Drop shell then connection; close errors are only logged.
    async fn release(&mut self) {
        if let Some(mut shell) = self.shell.take()
            && let Err(e) = shell.close().await
        {
            debug!("Error closing shell on {}: {}", self.target.host, e);
        }
        if let Some(connection) = self.connection.take()
            && let Err(e) = connection.close().await
        {
            debug!("Error closing connection to {}: {}", self.target.host, e);
        }
    }

    fn set_state(&self, state: SessionState) {
        let now = chrono::Utc::now();
        self.status.send_modify(|status| {
            status.state = state;
            if state == SessionState::Connected {
                status.connected_at = Some(now);
                status.last_activity = now;
            }
        });
    }

    fn touch(&self) {
        let now = chrono::Utc::now();
        self.status.send_modify(|status| status.last_activity = now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::mock::{MockConnector, fake_shell, target};

    fn session(mock: &Arc<MockConnector>, completion: CompletionMode) -> InteractiveSession {
        let connector: Arc<dyn Connector> = mock.clone();
        InteractiveSession::new(
            target("10.0.0.5"),
            connector,
            ShellSettings {
                completion,
                ..Default::default()
            },
        )
    }

    async fn connected(mock: &Arc<MockConnector>, completion: CompletionMode) -> InteractiveSession {
        let mut session = session(mock, completion);
        session.connect().await.unwrap();
        session
    }

    mod connect {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_connect_flushes_banner_into_buffer() {
            let mock = Arc::new(MockConnector::new());
            let session = connected(&mock, CompletionMode::Sentinel).await;

            assert!(session.is_connected());
            assert_eq!(session.state(), SessionState::Connected);
            assert!(session.buffered_output().contains("Last login"));
            assert_eq!(mock.connects(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_failed_connect_returns_to_disconnected() {
            let mock = Arc::new(MockConnector::new());
            mock.fail_next_connect(SessionError::Connect {
                host: "10.0.0.5".to_string(),
                reason: "Connection refused".to_string(),
            });
            let mut session = session(&mock, CompletionMode::Sentinel);

            let err = session.connect().await.unwrap_err();

            assert!(matches!(err, SessionError::Connect { .. }));
            assert_eq!(session.state(), SessionState::Disconnected);

            session.connect().await.unwrap();
            assert!(session.is_connected());
        }

        #[tokio::test(start_paused = true)]
        async fn test_state_changes_are_published() {
            let mock = Arc::new(MockConnector::new());
            let mut session = session(&mock, CompletionMode::Sentinel);
            let status = session.subscribe();

            session.connect().await.unwrap();
            assert_eq!(status.borrow().state, SessionState::Connected);
            assert!(status.borrow().connected_at.is_some());

            session.disconnect().await;
            assert_eq!(status.borrow().state, SessionState::Disconnected);
        }
    }

    mod execute {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_sentinel_mode_reports_output_and_exit_code() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            let result = session
                .execute("echo hi", Duration::from_secs(5))
                .await
                .unwrap();

            assert!(result.completed);
            assert_eq!(result.exit_code, Some(0));
            assert!(result.output.contains("hi\r\n"));
            assert!(!result.output.contains("__LMT_"));
            assert!(!result.output.contains("printf"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_sentinel_mode_captures_failure_status() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            let result = session.execute("false", Duration::from_secs(5)).await.unwrap();
            assert_eq!(result.exit_code, Some(1));

            let result = session
                .execute("nosuchcmd", Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(result.exit_code, Some(127));
            assert!(result.output.contains("command not found"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_prompt_mode_stops_at_prompt() {
            let mock = Arc::new(MockConnector::new().with_responder(fake_shell("# ")));
            let mut session = connected(&mock, CompletionMode::Prompt).await;

            let result = session
                .execute("echo hi", Duration::from_secs(5))
                .await
                .unwrap();

            assert!(result.completed);
            assert_eq!(result.exit_code, None);
            assert!(result.output.contains("hi"));
            assert!(result.output.ends_with("# "));
            assert!(result.elapsed < Duration::from_secs(1));
        }

        #[tokio::test(start_paused = true)]
        async fn test_never_returns_output_of_earlier_command() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            session.execute("echo first", Duration::from_secs(5)).await.unwrap();
            mock.last_shell().push_output("late output from first\r\n");

            let result = session
                .execute("echo second", Duration::from_secs(5))
                .await
                .unwrap();

            assert!(result.output.contains("second"));
            assert!(!result.output.contains("first"));
            assert!(!session.buffered_output().contains("first"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_banner_is_not_part_of_first_command() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            let result = session.execute("pwd", Duration::from_secs(5)).await.unwrap();

            assert!(result.output.contains("/root"));
            assert!(!result.output.contains("Last login"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_bounds_latency_and_keeps_partial_output() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;
            let timeout = Duration::from_secs(2);

            let started = Instant::now();
            let result = session.execute("hang", timeout).await.unwrap();

            assert!(!result.completed);
            assert_eq!(result.exit_code, None);
            assert!(result.output.contains("hang"));
            assert!(started.elapsed() <= timeout + POLL_INTERVAL);
            assert!(result.elapsed >= timeout);
            assert!(session.is_connected());
        }

        #[tokio::test(start_paused = true)]
        async fn test_prompt_mode_timeout_is_bounded() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Prompt).await;
            let timeout = Duration::from_millis(750);

            let started = Instant::now();
            let result = session.execute("hang", timeout).await.unwrap();

            assert!(!result.completed);
            assert!(started.elapsed() <= timeout + POLL_INTERVAL);
        }

        #[tokio::test(start_paused = true)]
        async fn test_requires_connection() {
            let mock = Arc::new(MockConnector::new());
            let mut session = session(&mock, CompletionMode::Sentinel);

            let err = session
                .execute("echo hi", Duration::from_secs(1))
                .await
                .unwrap_err();

            assert!(matches!(err, SessionError::NotConnected { .. }));
            assert_eq!(mock.connects(), 0);
        }
    }

    mod reading {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_read_error_is_swallowed() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;
            mock.last_shell().fail_next_read("connection reset by peer");

            let text = session.read_available().await;

            assert_eq!(text, "");
            assert!(session.is_connected());
        }

        #[tokio::test(start_paused = true)]
        async fn test_closed_channel_disconnects_session() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;
            let shell = mock.last_shell();
            shell.push_output("logout\r\n");
            shell.close_remote();

            let text = session.read_available().await;

            assert_eq!(text, "logout\r\n");
            assert_eq!(session.state(), SessionState::Disconnected);
            assert_eq!(mock.closes(), 1);
            let err = session
                .execute("echo hi", Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::NotConnected { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_drain_runs_for_full_duration() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;
            mock.last_shell().push_output("tick 1\r\n");

            let started = Instant::now();
            let output = session
                .drain_real_time(Duration::from_secs(3))
                .await
                .unwrap();

            assert_eq!(output, "tick 1\r\n");
            assert!(started.elapsed() >= Duration::from_secs(3));
            assert!(started.elapsed() <= Duration::from_secs(3) + POLL_INTERVAL);
        }

        #[tokio::test(start_paused = true)]
        async fn test_activity_is_tracked() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;
            let status = session.subscribe();
            let sent_at = chrono::Utc::now();
            assert!(status.borrow().last_activity <= sent_at);

            session.send_input("ls").await.unwrap();

            assert!(status.borrow().last_activity >= sent_at);
        }
    }

    mod input {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_send_input_appends_newline() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            session.send_input("y").await.unwrap();

            assert_eq!(mock.last_shell().written(), "y\n");
        }

        #[tokio::test(start_paused = true)]
        async fn test_input_reaches_a_command_reading_stdin() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            let waiting = session
                .execute("read name", Duration::from_secs(1))
                .await
                .unwrap();
            assert!(!waiting.completed);

            session.send_input("bob").await.unwrap();
            let result = session
                .execute("echo \"name=[$name]\"", Duration::from_secs(5))
                .await
                .unwrap();

            assert!(result.completed);
            assert_eq!(result.exit_code, Some(0));
            assert!(result.output.contains("name=[bob]"));
            assert!(!result.output.contains("command not found"));
            assert!(!result.output.contains("printf"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_command_and_marker_are_written_as_one_line() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            session.execute("true", Duration::from_secs(5)).await.unwrap();

            let written = mock.last_shell().written();
            assert!(written.starts_with("true; printf "));
            assert_eq!(written.matches('\n').count(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_send_input_requires_connection() {
            let mock = Arc::new(MockConnector::new());
            let mut session = session(&mock, CompletionMode::Sentinel);

            assert!(matches!(
                session.send_input("y").await,
                Err(SessionError::NotConnected { .. })
            ));
            assert!(matches!(
                session.drain_real_time(Duration::from_secs(1)).await,
                Err(SessionError::NotConnected { .. })
            ));
        }
    }

    mod disconnect {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_disconnect_is_idempotent() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            session.disconnect().await;
            session.disconnect().await;

            assert_eq!(session.state(), SessionState::Disconnected);
            assert_eq!(mock.closes(), 1);
            assert!(mock.last_shell().is_closed());
        }

        #[tokio::test(start_paused = true)]
        async fn test_reconnect_opens_a_new_shell() {
            let mock = Arc::new(MockConnector::new());
            let mut session = connected(&mock, CompletionMode::Sentinel).await;

            session.connect().await.unwrap();

            assert_eq!(mock.connects(), 2);
            assert_eq!(mock.closes(), 1);
            assert_eq!(mock.shells().len(), 2);
        }
    }
}
