//! Builder patterns for constructing MCP response messages.
//!
//! These builders follow the fluent API pattern to turn session and command
//! results into the plain-text replies returned by every tool.

use std::time::Duration;

use crate::mcp::types::{Acquisition, CommandOutput, SessionSnapshot, SessionState};

/// Timestamp layout used in session listings.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Builder for `create_interactive_session` replies.
///
/// # Example
///
/// ```ignore
/// let message = SessionMessageBuilder::new("10.0.0.5")
///     .with_user("root", 22)
///     .acquisition(Acquisition::Reused)
///     .build();
/// ```
pub struct SessionMessageBuilder {
    host: String,
    user: Option<(String, u16)>,
    acquisition: Acquisition,
}

impl SessionMessageBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            acquisition: Acquisition::Created,
        }
    }

    /// Show who the session is logged in as.
    pub fn with_user(mut self, username: impl Into<String>, port: u16) -> Self {
        self.user = Some((username.into(), port));
        self
    }

    pub fn acquisition(mut self, acquisition: Acquisition) -> Self {
        self.acquisition = acquisition;
        self
    }

    pub fn build(&self) -> String {
        let headline = match self.acquisition {
            Acquisition::Created => format!("Interactive session created for {}.", self.host),
            Acquisition::Reused => {
                format!("Interactive session for {} is already connected.", self.host)
            }
            Acquisition::Reconnected => {
                format!("Interactive session for {} was reconnected.", self.host)
            }
        };

        let mut lines = vec![format!("{} Session ID: {}", headline, self.host)];
        if let Some((ref username, port)) = self.user {
            lines.push(format!("Logged in as {}@{}:{}", username, self.host, port));
        }
        lines.push(format!(
            "Use execute_interactive_command with ip_address '{}' to run commands.",
            self.host
        ));
        lines.join("\n")
    }
}

/// Builder for the reply to a command run inside an interactive shell.
pub struct ShellCommandMessageBuilder {
    command: String,
    output: String,
    exit_code: Option<i32>,
    timed_out_after: Option<Duration>,
}

impl ShellCommandMessageBuilder {
    pub fn new(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            exit_code: None,
            timed_out_after: None,
        }
    }

    /// Exit status reported by the completion sentinel, if any.
    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Mark the output as partial because `timeout` elapsed first.
    pub fn timed_out(mut self, timeout: Option<Duration>) -> Self {
        self.timed_out_after = timeout;
        self
    }

    pub fn build(&self) -> String {
        let mut message = format!("Command: {}\nOutput:\n{}", self.command, self.output);
        if let Some(code) = self.exit_code {
            message.push_str(&format!("\nExit code: {}", code));
        }
        if let Some(timeout) = self.timed_out_after {
            message.push_str(&format!(
                "\nCommand still running after {}s; output may be incomplete. \
                 Use get_real_time_output to read more.",
                timeout.as_secs()
            ));
        }
        message
    }
}

/// Builder for one-shot command replies.
///
/// `Output:` and `Error:` sections only appear when the stream is non-empty.
pub struct CommandOutputMessageBuilder<'a> {
    output: &'a CommandOutput,
    timeout: Option<Duration>,
}

impl<'a> CommandOutputMessageBuilder<'a> {
    pub fn new(output: &'a CommandOutput) -> Self {
        Self {
            output,
            timeout: None,
        }
    }

    /// Timeout the command ran under, mentioned when it expired.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(&self) -> String {
        let mut message = format!("Exit code: {}\n", self.output.exit_code);
        if !self.output.stdout.is_empty() {
            message.push_str(&format!("Output:\n{}\n", self.output.stdout));
        }
        if !self.output.stderr.is_empty() {
            message.push_str(&format!("Error:\n{}\n", self.output.stderr));
        }
        if self.output.timed_out {
            match self.timeout {
                Some(timeout) => message.push_str(&format!(
                    "Command timed out after {}s; output is partial\n",
                    timeout.as_secs()
                )),
                None => message.push_str("Command timed out; output is partial\n"),
            }
        }
        message
    }
}

/// Builder for `list_active_sessions` replies.
pub struct SessionListMessageBuilder<'a> {
    sessions: &'a [SessionSnapshot],
}

impl<'a> SessionListMessageBuilder<'a> {
    pub fn new(sessions: &'a [SessionSnapshot]) -> Self {
        Self { sessions }
    }

    pub fn build(&self) -> String {
        if self.sessions.is_empty() {
            return "No active sessions".to_string();
        }

        let mut message = String::from("Active Sessions:\n");
        for session in self.sessions {
            // Connecting is only visible mid-reconnect; report it as not connected.
            let state = match session.state {
                SessionState::Connected => "Connected",
                SessionState::Connecting | SessionState::Disconnected => "Disconnected",
            };
            message.push_str(&format!(
                "- {}: {} (Created: {}, User: {}, Port: {}, Last activity: {})\n",
                session.host,
                state,
                session.created_at.format(TIMESTAMP_FORMAT),
                session.username,
                session.port,
                session.last_activity.format(TIMESTAMP_FORMAT),
            ));
        }
        message
    }
}

/// Builder for reports made of one titled section per command.
///
/// # Example
///
/// ```ignore
/// let report = SectionedReportBuilder::new()
///     .section("uname -a", "Linux host 6.1.0")
///     .section("free -h", "Mem: ...")
///     .build();
/// ```
#[derive(Default)]
pub struct SectionedReportBuilder {
    sections: Vec<String>,
}

impl SectionedReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, title: impl AsRef<str>, body: impl AsRef<str>) -> Self {
        self.sections
            .push(format!("=== {} ===\n{}", title.as_ref(), body.as_ref()));
        self
    }

    pub fn build(&self) -> String {
        self.sections.join("\n")
    }
}
