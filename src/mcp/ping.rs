//! Local reachability probe.
//!
//! `ping_host` runs the system `ping` binary on the machine hosting the MCP
//! server, not on a remote host. Arguments are passed directly to the
//! process, never through a shell.

use std::fmt;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound on a whole ping run.
pub const PING_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_PING_COUNT: u32 = 4;

/// Arguments for `ping` on `os` (as in [`std::env::consts::OS`]).
///
/// Each echo request waits at most one second for its reply.
pub fn ping_args(host: &str, count: u32, os: &str) -> Vec<String> {
    let count = count.max(1).to_string();
    if os == "windows" {
        vec!["-n".into(), count, "-w".into(), "1000".into(), host.into()]
    } else {
        vec!["-c".into(), count, "-W".into(), "1".into(), host.into()]
    }
}

/// Finished ping process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingOutcome {
    pub host: String,
    pub system: String,
    pub command: String,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl PingOutcome {
    pub fn reachable(&self) -> bool {
        self.return_code == 0
    }
}

impl fmt::Display for PingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ping {} ({}):", self.host, self.system)?;
        writeln!(f, "Command: {}", self.command)?;
        writeln!(f, "Return code: {}", self.return_code)?;
        if !self.stdout.is_empty() {
            writeln!(f, "Output:\n{}", self.stdout)?;
        }
        if !self.stderr.is_empty() {
            writeln!(f, "Error:\n{}", self.stderr)?;
        }
        if self.reachable() {
            write!(f, "✅ Host is reachable")
        } else {
            write!(f, "❌ Host is unreachable")
        }
    }
}

/// Runs the ping binary with a time limit.
#[derive(Debug, Clone)]
pub struct Pinger {
    program: String,
    os: String,
    timeout: Duration,
}

impl Default for Pinger {
    fn default() -> Self {
        Self {
            program: "ping".to_string(),
            os: std::env::consts::OS.to_string(),
            timeout: PING_TIMEOUT,
        }
    }
}

impl Pinger {
    #[cfg(test)]
    fn with_program(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            timeout,
            ..Default::default()
        }
    }

    /// Ping `host` and describe the result. Never fails: problems are part of the text.
    pub async fn ping(&self, host: &str, count: u32) -> String {
        if host.starts_with('-') {
            return format!("Ping {}: ❌ Invalid host name", host);
        }

        let args = ping_args(host, count, &self.os);
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Running {}", command);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return spawn_failure(host, &e),
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => PingOutcome {
                host: host.to_string(),
                system: self.os.clone(),
                command,
                return_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .to_string(),
            Ok(Err(e)) => {
                warn!("Ping of {} failed: {}", host, e);
                format!("Ping {}: ❌ Error: {}", host, e)
            }
            Err(_) => format!(
                "Ping {}: ⏱️ Timeout after {} seconds",
                host,
                self.timeout.as_secs()
            ),
        }
    }
}

fn spawn_failure(host: &str, error: &std::io::Error) -> String {
    match error.kind() {
        ErrorKind::NotFound => format!("Ping {}: ❌ Ping command not found on system", host),
        ErrorKind::PermissionDenied => format!(
            "Ping {}: ❌ Permission denied. Try using alternative connectivity check.",
            host
        ),
        _ => format!("Ping {}: ❌ Error: {}", host, error),
    }
}
