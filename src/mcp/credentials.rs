//! Connection credential resolution.
//!
//! Each field (host, username, password, port, key path) is resolved
//! independently, first match wins:
//!
//! 1. explicit tool arguments
//! 2. environment variables (`HOST`, `USERNAME`, `PASSWORD`, `PORT`, `SSH_KEY_PATH`)
//! 3. the discovered MCP client configuration file
//! 4. built-in defaults (`root`, port 22, `~/.ssh/id_rsa`)
//!
//! The layering itself is pure ([`CredentialSet::or`]). Reading the
//! environment and discovering the configuration file are separate loaders
//! that run once, when the [`CredentialResolver`] is built.
//!
//! # Configuration file
//!
//! The first existing file among `~/.mcp/config.json`,
//! `~/.config/mcp/config.json`, `./mcp_config.json` and
//! `./claude_desktop_config.json` is read. Within its `mcpServers` map, the
//! first server whose name contains `linux-mcp-toolkit` supplies values from
//! `KEY=VALUE` entries of its `args` array, then from its `env` map.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::mcp::error::SessionError;
use crate::mcp::transport::ConnectionTarget;

pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_PORT: u16 = 22;

/// Server entries whose name contains this are read from the config file.
const SERVER_NAME_MARKER: &str = "linux-mcp-toolkit";

/// A partial set of connection credentials. `None` means "not provided here".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub key_path: Option<PathBuf>,
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("port", &self.port)
            .field("key_path", &self.key_path)
            .finish()
    }
}

/// Empty strings count as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CredentialSet {
    /// Credentials passed explicitly by a caller. Empty strings are ignored.
    pub fn explicit(
        host: Option<String>,
        username: Option<String>,
        password: Option<String>,
        port: Option<u16>,
    ) -> Self {
        Self {
            host: non_empty(host),
            username: non_empty(username),
            password: non_empty(password),
            port,
            key_path: None,
        }
    }

    /// Only a host, for calls that carry no credentials of their own.
    pub fn for_host(host: Option<String>) -> Self {
        Self::explicit(host, None, None, None)
    }

    /// Per-field fallback: keep values present in `self`, take the rest from `fallback`.
    pub fn or(self, fallback: CredentialSet) -> CredentialSet {
        CredentialSet {
            host: self.host.or(fallback.host),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            port: self.port.or(fallback.port),
            key_path: self.key_path.or(fallback.key_path),
        }
    }

    /// Whether any field other than the host is set.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
            || self.password.is_some()
            || self.port.is_some()
            || self.key_path.is_some()
    }

    /// Build from a `KEY -> value` lookup using the environment variable names.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = non_empty(lookup("PORT")).and_then(|raw| match raw.trim().parse() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!("Ignoring invalid PORT value {:?}", raw);
                None
            }
        });

        Self {
            host: non_empty(lookup("HOST")),
            username: non_empty(lookup("USERNAME")),
            password: non_empty(lookup("PASSWORD")),
            port,
            key_path: non_empty(lookup("SSH_KEY_PATH")).map(PathBuf::from),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Built-in defaults. There is no default host or password.
    pub fn defaults() -> Self {
        Self {
            host: None,
            username: Some(DEFAULT_USERNAME.to_string()),
            password: None,
            port: Some(DEFAULT_PORT),
            key_path: dirs::home_dir().map(|home| home.join(".ssh").join("id_rsa")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct McpConfigFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerEntry {
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    env: BTreeMap<String, Value>,
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract credentials from the contents of an MCP client configuration file.
///
/// Returns `None` when the JSON is invalid or has no matching server entry.
pub fn parse_config(contents: &str) -> Option<CredentialSet> {
    let config: McpConfigFile = match serde_json::from_str(contents) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring unparseable MCP configuration: {}", e);
            return None;
        }
    };

    let (name, entry) = config
        .mcp_servers
        .iter()
        .find(|(name, _)| name.to_lowercase().contains(SERVER_NAME_MARKER))?;
    debug!("Using credentials from MCP server entry '{}'", name);

    let arg_pairs: BTreeMap<String, String> = entry
        .args
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|arg| arg.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let from_args = CredentialSet::from_lookup(|key| arg_pairs.get(key).cloned());
    let from_env =
        CredentialSet::from_lookup(|key| entry.env.get(key).and_then(value_as_string));

    Some(from_args.or(from_env))
}

/// Candidate configuration files, in lookup order.
pub fn config_candidates(home: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(4);
    if let Some(home) = home {
        candidates.push(home.join(".mcp").join("config.json"));
        candidates.push(home.join(".config").join("mcp").join("config.json"));
    }
    candidates.push(cwd.join("mcp_config.json"));
    candidates.push(cwd.join("claude_desktop_config.json"));
    candidates
}

/// Read the first candidate file that configures this server.
///
/// Files that are missing, unreadable, invalid or without a matching
/// `mcpServers` entry are skipped. Nothing usable yields an empty set.
pub fn discover_config(candidates: &[PathBuf]) -> CredentialSet {
    for path in candidates.iter().filter(|path| path.is_file()) {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        match parse_config(&contents) {
            Some(creds) => {
                info!("Loading connection defaults from {}", path.display());
                return creds;
            }
            None => debug!("{} does not configure this server", path.display()),
        }
    }

    debug!("No MCP configuration file found");
    CredentialSet::default()
}

/// Resolves explicit arguments into a complete [`ConnectionTarget`].
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    environment: CredentialSet,
    discovered: CredentialSet,
    defaults: CredentialSet,
}

impl CredentialResolver {
    pub fn new(environment: CredentialSet, discovered: CredentialSet, defaults: CredentialSet) -> Self {
        Self {
            environment,
            discovered,
            defaults,
        }
    }

    /// Load the environment and the discovered configuration file once.
    pub fn from_environment() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let candidates = config_candidates(dirs::home_dir().as_deref(), &cwd);
        Self::new(
            CredentialSet::from_env(),
            discover_config(&candidates),
            CredentialSet::defaults(),
        )
    }

    /// The layered, still partial, credential set.
    pub fn layer(&self, explicit: &CredentialSet) -> CredentialSet {
        explicit
            .clone()
            .or(self.environment.clone())
            .or(self.discovered.clone())
            .or(self.defaults.clone())
    }

    /// The host used when a caller gives none.
    pub fn default_host(&self) -> Option<String> {
        self.layer(&CredentialSet::default()).host
    }

    pub fn resolve(&self, explicit: &CredentialSet) -> Result<ConnectionTarget, SessionError> {
        let layered = self.layer(explicit);
        let host = layered.host.ok_or(SessionError::MissingHost)?;

        Ok(ConnectionTarget {
            host,
            port: layered.port.unwrap_or(DEFAULT_PORT),
            username: layered
                .username
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: layered.password,
            key_path: layered.key_path,
        })
    }
}
