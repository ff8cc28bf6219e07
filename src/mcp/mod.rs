//! MCP Linux toolkit module: SSH sessions and administration tools.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Value types shared by sessions, the registry and the tools
//! - `config`: Configuration resolution with environment variable support
//! - `error`: Session errors and their retry classification
//! - `credentials`: Credential layering (arguments, environment, MCP config, defaults)
//! - `auth`: Ordered authentication strategies
//! - `transport`: Connector/connection/shell traits, `client`: their russh implementation
//! - `shell`: Interactive sessions and completion detection (`completion`)
//! - `registry`: One live session per host
//! - `oneshot`: Commands over a fresh connection
//! - `admin`, `ping`, `message`: Command builders and reply formatting
//! - `toolkit`: Tool behaviour, `commands`: the MCP tool surface

pub mod admin;
pub mod auth;
pub mod client;
pub mod commands;
pub mod completion;
pub mod config;
pub mod credentials;
pub mod error;
pub mod message;
pub mod oneshot;
pub mod ping;
pub mod registry;
pub(crate) mod session;
pub mod shell;
pub mod toolkit;
pub mod transport;
pub mod types;

pub use commands::McpLinuxTools;
pub use toolkit::Toolkit;
