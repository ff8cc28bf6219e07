//! Tunable resolution for the toolkit.
//!
//! Every tunable resolves with a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided function parameter (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! Unparseable environment values fall through to the default.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_CONNECT_TIMEOUT` | 10s | Connection timeout in seconds |
//! | `SSH_COMMAND_TIMEOUT` | 30s | Command timeout in seconds |
//! | `SSH_MAX_RETRIES` | 0 | Connect retry attempts after the first |
//! | `SSH_RETRY_DELAY_MS` | 1000ms | Initial retry delay in milliseconds |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |
//! | `SHELL_COMPLETION_MODE` | sentinel | `sentinel` or `prompt` |
//! | `MCP_PORT` | 8000 | HTTP listener port |
//!
//! Connection credentials (`HOST`, `USERNAME`, ...) are resolved separately
//! by [`crate::mcp::credentials`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::mcp::completion::CompletionMode;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default command timeout in seconds, for both shell and one-shot execution
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Connect attempts are not retried unless asked for
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 0;

pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on the backoff between connect retries
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const DEFAULT_MCP_PORT: u16 = 8000;

pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "SSH_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "SSH_RETRY_DELAY_MS";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";
pub(crate) const COMPLETION_MODE_ENV_VAR: &str = "SHELL_COMPLETION_MODE";
pub(crate) const MCP_PORT_ENV_VAR: &str = "MCP_PORT";

/// Read and parse an environment variable, `None` when unset or invalid.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value {:?} for {}", raw, name);
            None
        }
    }
}

/// Resolve the connection timeout: parameter -> `SSH_CONNECT_TIMEOUT` -> 10s
pub fn resolve_connect_timeout(timeout_param: Option<u64>) -> Duration {
    let secs = timeout_param
        .or_else(|| env_parse(CONNECT_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Resolve the command timeout: parameter -> `SSH_COMMAND_TIMEOUT` -> 30s
pub fn resolve_command_timeout(timeout_param: Option<u64>) -> Duration {
    let secs = timeout_param
        .or_else(|| env_parse(COMMAND_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Resolve the connect retry count: parameter -> `SSH_MAX_RETRIES` -> 0
pub fn resolve_max_retries(max_retries_param: Option<u32>) -> u32 {
    max_retries_param
        .or_else(|| env_parse(MAX_RETRIES_ENV_VAR))
        .unwrap_or(DEFAULT_MAX_RETRIES)
}

/// Resolve the initial retry delay: parameter -> `SSH_RETRY_DELAY_MS` -> 1000ms
pub fn resolve_retry_delay(retry_delay_param: Option<u64>) -> Duration {
    let millis = retry_delay_param
        .or_else(|| env_parse(RETRY_DELAY_MS_ENV_VAR))
        .unwrap_or(DEFAULT_RETRY_DELAY_MS);
    Duration::from_millis(millis)
}

/// Resolve the compression setting: parameter -> `SSH_COMPRESSION` -> true
pub fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolve how shell commands detect completion: parameter -> `SHELL_COMPLETION_MODE` -> sentinel
pub fn resolve_completion_mode(mode_param: Option<CompletionMode>) -> CompletionMode {
    mode_param
        .or_else(|| env_parse(COMPLETION_MODE_ENV_VAR))
        .unwrap_or_default()
}

/// Resolve the HTTP listener port: parameter -> `MCP_PORT` -> 8000
pub fn resolve_mcp_port(port_param: Option<u16>) -> u16 {
    port_param
        .or_else(|| env_parse(MCP_PORT_ENV_VAR))
        .unwrap_or(DEFAULT_MCP_PORT)
}
