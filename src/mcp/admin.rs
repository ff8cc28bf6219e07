//! Shell command builders for the administration tools.
//!
//! Every tool that is not an interactive session boils down to one or more
//! command strings run through the one-shot executor. The strings are built
//! here so they can be checked without a remote host. Paths, file content and
//! process names are single-quoted before they reach a shell.

use std::fmt;
use std::str::FromStr;

/// Longest file excerpt returned by a `read` operation, in characters.
pub const MAX_READ_CHARS: usize = 3000;

/// Identity probe run by `connect_default_host`.
pub const DEFAULT_HOST_PROBE: &str = "whoami && hostname && uptime";

/// Commands aggregated by `quick_system_info`.
pub const SYSTEM_INFO_COMMANDS: [&str; 5] = [
    "uname -a",
    "cat /etc/os-release | head -5",
    "free -h",
    "df -h | head -5",
    "ps aux | head -10",
];

/// Commands aggregated by `network_info`.
pub const NETWORK_COMMANDS: [&str; 4] = [
    "ip addr show | head -20",
    "netstat -tlnp | head -15",
    "ss -tlnp | head -15",
    "ufw status 2>/dev/null || echo 'UFW not installed'",
];

/// Quote `value` for a POSIX shell.
///
/// The result is always wrapped in single quotes; embedded single quotes
/// become `'"'"'`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

/// Operations accepted by `file_operations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    List,
    Exists,
}

impl FileOperation {
    pub const SUPPORTED: &'static str = "Supported operations: read, write, list, exists";
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Read => write!(f, "read"),
            FileOperation::Write => write!(f, "write"),
            FileOperation::List => write!(f, "list"),
            FileOperation::Exists => write!(f, "exists"),
        }
    }
}

impl FromStr for FileOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(FileOperation::Read),
            "write" => Ok(FileOperation::Write),
            "list" => Ok(FileOperation::List),
            "exists" => Ok(FileOperation::Exists),
            _ => Err(FileOperation::SUPPORTED.to_string()),
        }
    }
}

/// Build the remote command for a file operation.
///
/// `write` needs non-empty `content`; every other operation ignores it.
pub fn file_command(
    operation: FileOperation,
    path: &str,
    content: Option<&str>,
) -> Result<String, String> {
    let path = shell_quote(path);
    match operation {
        FileOperation::Read => Ok(format!("cat {path}")),
        FileOperation::Write => match content.filter(|c| !c.is_empty()) {
            Some(content) => Ok(format!("printf '%s\\n' {} > {path}", shell_quote(content))),
            None => Err("The write operation requires content".to_string()),
        },
        FileOperation::List => Ok(format!("ls -la {path}")),
        FileOperation::Exists => Ok(format!(
            "test -f {path} && echo 'EXISTS' || echo 'NOT_EXISTS'"
        )),
    }
}

/// Cut `output` to [`MAX_READ_CHARS`] characters, marking the cut with `...`.
pub fn truncate_output(output: &str) -> String {
    match output.char_indices().nth(MAX_READ_CHARS) {
        Some((cut, _)) => format!("{}...", &output[..cut]),
        None => output.to_string(),
    }
}

/// Actions accepted by `service_control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Status,
    Enable,
    Disable,
}

impl ServiceAction {
    pub const ALL: [ServiceAction; 6] = [
        ServiceAction::Start,
        ServiceAction::Stop,
        ServiceAction::Restart,
        ServiceAction::Status,
        ServiceAction::Enable,
        ServiceAction::Disable,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Status => "status",
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ServiceAction::ALL
            .into_iter()
            .find(|action| action.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = ServiceAction::ALL.iter().map(|a| a.as_str()).collect();
                format!("Invalid action '{}'. Supported: {}", s, names.join(", "))
            })
    }
}

pub fn service_command(service: &str, action: ServiceAction) -> String {
    format!("systemctl {action} {}", shell_quote(service))
}

/// Commands aggregated by `monitor_process` for `process`.
pub fn monitor_commands(process: &str) -> Vec<String> {
    let quoted = shell_quote(process);
    vec![
        format!("ps aux | grep {quoted} | grep -v grep"),
        format!("pgrep -f {quoted} | wc -l"),
        format!("systemctl is-active {quoted} 2>/dev/null || echo 'Service not found'"),
    ]
}
