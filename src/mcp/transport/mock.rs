//! Scripted in-memory transport used by unit tests.
//!
//! [`MockConnector`] hands out connections whose shells answer each written
//! line through a [`Responder`]. The default responder, [`fake_shell`],
//! behaves like a small POSIX shell: it echoes input, understands a handful
//! of commands, prints a prompt after each one and answers completion
//! sentinels with the last exit status.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ConnectionTarget, Connector, RemoteConnection, ShellStream};
use crate::mcp::auth::ScriptedHandle;
use crate::mcp::client::authenticate_target;
use crate::mcp::error::SessionError;
use crate::mcp::types::CommandOutput;

/// Turns one line written to the shell into the chunks it produces.
pub(crate) type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Answers one-shot exec requests.
pub(crate) type ExecResponder = Arc<dyn Fn(&str) -> CommandOutput + Send + Sync>;

pub(crate) const DEFAULT_BANNER: &str = "Last login: Mon Oct 19 09:00:00 2026\r\nroot@mock:~$ ";

/// What the fake shell remembers between lines.
#[derive(Default)]
struct FakeShellState {
    last_status: i32,
    /// `hang` is running; nothing is executed any more
    busy: bool,
    /// A `read` waiting for its input line, with the marker token that follows it
    reading: Option<(String, Option<String>)>,
    vars: HashMap<String, String>,
}

impl FakeShellState {
    /// What the shell prints once a command line has finished.
    fn finish(&self, token: Option<&str>, prompt: &str) -> String {
        match token {
            Some(token) => format!("\r\n__LMT_{token}:{}\r\n{prompt}", self.last_status),
            None => prompt.to_string(),
        }
    }

    fn expand(&self, text: &str) -> String {
        self.vars
            .iter()
            .fold(text.to_string(), |text, (name, value)| {
                text.replace(&format!("${name}"), value)
            })
    }
}

/// A tiny shell: `echo` (with `$var` expansion), `true`, `false`, `pwd`,
/// `read VAR` (takes the next line), `hang` (never finishes), anything else
/// is "command not found". A completion marker on the same line runs after
/// the command, as in a real shell.
pub(crate) fn fake_shell(prompt: &'static str) -> Responder {
    let state = Arc::new(Mutex::new(FakeShellState::default()));

    Arc::new(move |line: &str| {
        let mut shell = state.lock().unwrap();
        let echo = format!("{line}\r\n");
        if shell.busy {
            return vec![echo];
        }

        if let Some((variable, token)) = shell.reading.take() {
            shell.vars.insert(variable, line.to_string());
            shell.last_status = 0;
            return vec![echo, shell.finish(token.as_deref(), prompt)];
        }

        let (command, token) = split_marker(line);
        let (output, status) = match command {
            "" => (String::new(), shell.last_status),
            "true" => (String::new(), 0),
            "false" => (String::new(), 1),
            "pwd" => ("/root\r\n".to_string(), 0),
            "hang" => {
                shell.busy = true;
                return vec![echo];
            }
            cmd if cmd.starts_with("read ") => {
                shell.reading = Some((cmd[5..].trim().to_string(), token.map(str::to_string)));
                return vec![echo];
            }
            cmd if cmd.starts_with("echo ") => (format!("{}\r\n", shell.expand(&cmd[5..])), 0),
            cmd => (format!("bash: {cmd}: command not found\r\n"), 127),
        };
        shell.last_status = status;
        vec![echo, format!("{output}{}", shell.finish(token, prompt))]
    })
}

/// Split `cmd; printf ... '__LMT_' '<token>' "$?"` into the command and the token.
fn split_marker(line: &str) -> (&str, Option<&str>) {
    let line = line.trim();
    match line.rfind("printf ") {
        Some(start) if line[start..].contains("'__LMT_'") => {
            let command = line[..start].trim_end().trim_end_matches(';').trim_end();
            (command, line[start..].split('\'').nth(5))
        }
        _ => (line, None),
    }
}

/// Answers `false` with status 1, `hang` with a timeout and anything else with its own text.
pub(crate) fn fake_exec() -> ExecResponder {
    Arc::new(|command: &str| match command.trim() {
        "false" => CommandOutput {
            exit_code: 1,
            ..Default::default()
        },
        "hang" => CommandOutput {
            stdout: "partial".to_string(),
            exit_code: -1,
            timed_out: true,
            ..Default::default()
        },
        "fail-stderr" => CommandOutput {
            stderr: "boom\n".to_string(),
            exit_code: 2,
            ..Default::default()
        },
        other => CommandOutput {
            stdout: format!("ran: {other}\n"),
            ..Default::default()
        },
    })
}

/// Shared state of one mock shell channel.
#[derive(Default)]
struct ShellState {
    pending: VecDeque<Vec<u8>>,
    written: Vec<String>,
    closed: bool,
    read_error: Option<String>,
}

/// Test-side handle to a shell opened through a [`MockConnector`].
#[derive(Clone)]
pub(crate) struct MockShellControl {
    state: Arc<Mutex<ShellState>>,
}

impl MockShellControl {
    /// Make output appear as if the remote side printed it unprompted.
    pub(crate) fn push_output(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.pending.push_back(text.as_bytes().to_vec());
    }

    /// Simulate the remote side closing the channel.
    pub(crate) fn close_remote(&self) {
        self.state.lock().unwrap().closed = true;
    }

    /// The next read fails with a transport error.
    pub(crate) fn fail_next_read(&self, reason: &str) {
        self.state.lock().unwrap().read_error = Some(reason.to_string());
    }

    /// Everything written to the shell so far.
    pub(crate) fn written(&self) -> String {
        self.state.lock().unwrap().written.concat()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

struct MockShell {
    host: String,
    state: Arc<Mutex<ShellState>>,
    responder: Responder,
}

#[async_trait]
impl ShellStream for MockShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(SessionError::ChannelClosed {
                host: self.host.clone(),
            });
        }

        let text = String::from_utf8_lossy(data).into_owned();
        for line in text.split_terminator('\n') {
            for chunk in (self.responder)(line) {
                state.pending.push_back(chunk.into_bytes());
            }
        }
        state.written.push(text);
        Ok(())
    }

    async fn read(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(reason) = state.read_error.take() {
                return Err(SessionError::TransportRead {
                    host: self.host.clone(),
                    reason,
                });
            }
            if let Some(chunk) = state.pending.pop_front() {
                return Ok(Some(chunk));
            }
            if state.closed {
                return Err(SessionError::ChannelClosed {
                    host: self.host.clone(),
                });
            }
        }

        tokio::time::sleep(wait).await;
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Counters and handles shared between a connector and its connections.
#[derive(Default)]
struct Shared {
    connects: AtomicUsize,
    closes: AtomicUsize,
    execs: Mutex<Vec<String>>,
    shells: Mutex<Vec<MockShellControl>>,
    failures: Mutex<VecDeque<SessionError>>,
}

struct MockConnection {
    host: String,
    banner: String,
    responder: Responder,
    exec_responder: ExecResponder,
    shared: Arc<Shared>,
}

#[async_trait]
impl RemoteConnection for MockConnection {
    async fn open_shell(&self) -> Result<Box<dyn ShellStream>, SessionError> {
        let state = Arc::new(Mutex::new(ShellState::default()));
        let control = MockShellControl {
            state: Arc::clone(&state),
        };
        control.push_output(&self.banner);
        self.shared.shells.lock().unwrap().push(control);

        Ok(Box::new(MockShell {
            host: self.host.clone(),
            state,
            responder: Arc::clone(&self.responder),
        }))
    }

    async fn exec(&self, command: &str, _timeout: Duration) -> Result<CommandOutput, SessionError> {
        self.shared.execs.lock().unwrap().push(command.to_string());
        Ok((self.exec_responder)(command))
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector whose hosts are all the same fake machine.
pub(crate) struct MockConnector {
    /// Credentials the fake server accepts, `None` to skip authentication
    accepted: Option<(Option<String>, Option<String>)>,
    banner: String,
    responder: Responder,
    exec_responder: ExecResponder,
    shared: Arc<Shared>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            accepted: None,
            banner: DEFAULT_BANNER.to_string(),
            responder: fake_shell("$ "),
            exec_responder: fake_exec(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub(crate) fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = responder;
        self
    }

    /// Authenticate every connect through the same chain the russh connector
    /// builds, against a server accepting only `password` and/or `key_path`.
    pub(crate) fn with_accepted_credentials(
        mut self,
        password: Option<&str>,
        key_path: Option<&str>,
    ) -> Self {
        self.accepted = Some((password.map(str::to_string), key_path.map(str::to_string)));
        self
    }

    /// Queue an error for the next connect attempt.
    pub(crate) fn fail_next_connect(&self, error: SessionError) {
        self.shared.failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn execs(&self) -> Vec<String> {
        self.shared.execs.lock().unwrap().clone()
    }

    /// Shells opened so far, oldest first.
    pub(crate) fn shells(&self) -> Vec<MockShellControl> {
        self.shared.shells.lock().unwrap().clone()
    }

    pub(crate) fn last_shell(&self) -> MockShellControl {
        self.shells().pop().expect("no shell has been opened")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteConnection>, SessionError> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.shared.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        if let Some((password, key_path)) = &self.accepted {
            let mut server = ScriptedHandle::accepting(password.as_deref(), key_path.as_deref());
            authenticate_target(&mut server, target).await?;
        }

        Ok(Box::new(MockConnection {
            host: target.host.clone(),
            banner: self.banner.clone(),
            responder: Arc::clone(&self.responder),
            exec_responder: Arc::clone(&self.exec_responder),
            shared: Arc::clone(&self.shared),
        }))
    }
}

pub(crate) fn target(host: &str) -> ConnectionTarget {
    ConnectionTarget {
        host: host.to_string(),
        port: 22,
        username: "root".to_string(),
        password: Some("secret".to_string()),
        key_path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_shell_tracks_exit_status() {
        let shell = fake_shell("$ ");
        let out = shell("false; printf '\\n%s%s:%d\\n' '__LMT_' 'abc' \"$?\"").concat();
        assert!(out.contains("__LMT_abc:1"));

        let out = shell("printf '\\n%s%s:%d\\n' '__LMT_' 'def' \"$?\"").concat();
        assert!(out.contains("__LMT_def:1"));
    }

    #[test]
    fn test_fake_shell_stays_busy_after_hang() {
        let shell = fake_shell("# ");
        shell("hang");
        let out = shell("echo later").concat();
        assert_eq!(out, "echo later\r\n");
    }

    #[test]
    fn test_fake_shell_read_takes_next_line() {
        let shell = fake_shell("$ ");
        let out = shell("read name; printf '\\n%s%s:%d\\n' '__LMT_' 'abc' \"$?\"").concat();
        assert!(!out.contains("__LMT_abc"));

        let out = shell("bob").concat();
        assert!(out.contains("__LMT_abc:0"));
        assert_eq!(shell("echo [$name]").concat(), "echo [$name]\r\n[bob]\r\n$ ");
    }
}
