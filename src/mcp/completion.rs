//! Detecting when a command typed into an interactive shell has finished.
//!
//! Two strategies are available:
//!
//! - [`CompletionMode::Sentinel`] follows each command with a `printf` that
//!   emits a unique marker carrying `$?`. Detection is exact and yields the
//!   exit status. The marker lines are stripped from what the caller sees.
//! - [`CompletionMode::Prompt`] treats output ending in a common prompt
//!   suffix (`"$ "`, `"# "`, `"> "`) as done. This is a heuristic: it fires
//!   early on output that happens to end like a prompt and never fires on
//!   shells with unusual prompts.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Output endings taken to mean the shell is waiting for input.
pub const PROMPT_SUFFIXES: [&str; 3] = ["$ ", "# ", "> "];

const MARKER_PREFIX: &str = "__LMT_";

/// How [`crate::mcp::shell::InteractiveSession::execute`] decides a command is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    #[default]
    Sentinel,
    Prompt,
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionMode::Sentinel => write!(f, "sentinel"),
            CompletionMode::Prompt => write!(f, "prompt"),
        }
    }
}

impl FromStr for CompletionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentinel" => Ok(CompletionMode::Sentinel),
            "prompt" => Ok(CompletionMode::Prompt),
            other => Err(format!(
                "unknown completion mode '{other}', expected 'sentinel' or 'prompt'"
            )),
        }
    }
}

/// Whether `output` ends the way an idle shell prompt does.
pub fn looks_like_prompt(output: &str) -> bool {
    PROMPT_SUFFIXES
        .iter()
        .any(|suffix| output.ends_with(suffix))
}

/// A single-use end-of-command marker.
#[derive(Debug, Clone)]
pub struct CompletionMarker {
    token: String,
}

impl CompletionMarker {
    pub fn new() -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The `printf` that reports the marker and `$?`.
    ///
    /// Prefix and token are passed as separate `printf` arguments so the
    /// terminal echo of the command line never contains the marker itself.
    fn report(&self) -> String {
        format!(
            "printf '\\n%s%s:%d\\n' '{MARKER_PREFIX}' '{}' \"$?\"",
            self.token
        )
    }

    /// The line to write to the shell: the command, then the marker report.
    ///
    /// Both go on one line. The shell reads the whole line before running
    /// any of it, so a command that reads stdin gets the next line the
    /// caller sends, not the marker report.
    pub fn wrap(&self, command: &str) -> String {
        let command = command.trim_end().trim_end_matches(';').trim_end();
        if command.is_empty() {
            return format!("{}\n", self.report());
        }
        // `cmd &; printf` is a syntax error
        let separator = if command.ends_with('&') && !command.ends_with("&&") {
            " "
        } else {
            "; "
        };
        format!("{command}{separator}{}\n", self.report())
    }

    /// Exit status carried by the marker, once the whole marker line has arrived.
    pub fn find_exit_code(&self, output: &str) -> Option<i32> {
        let needle = format!("{MARKER_PREFIX}{}:", self.token);
        let start = output.find(&needle)? + needle.len();
        let rest = &output[start..];

        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '-')
            .map(|end| &rest[..end])?;

        digits.parse().ok()
    }

    /// Remove the marker from `output`.
    ///
    /// The marker line itself is dropped. The echoed command line loses its
    /// marker report and keeps the command. An echo too mangled to find the
    /// report in (line editing, wrapping) is dropped whole.
    pub fn strip(&self, output: &str) -> String {
        let report = self.report();
        output
            .split_inclusive('\n')
            .filter_map(|line| {
                if !line.contains(&self.token) {
                    return Some(line.to_string());
                }
                let start = line.find(&report)?;
                let command = line[..start].trim_end().trim_end_matches(';');
                Some(format!("{command}{}", &line[start + report.len()..]))
            })
            .collect()
    }
}

impl Default for CompletionMarker {
    fn default() -> Self {
        Self::new()
    }
}
