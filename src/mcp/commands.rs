//! MCP Linux administration tools.
//!
//! This module exposes the [`Toolkit`] operations as MCP tools:
//!
//! - `create_interactive_session`: Open (or reuse) a persistent shell on a host
//! - `execute_interactive_command`: Run a command inside that shell
//! - `send_interactive_input`: Answer prompts in the shell
//! - `get_real_time_output`: Watch the shell for a while
//! - `list_active_sessions` / `close_session`: Session management
//! - `execute_command`, `file_operations`, `service_control`, `network_info`,
//!   `monitor_process`, `quick_system_info`, `connect_default_host`: One-shot tools
//! - `ping_host`: Local reachability probe

use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text};

use super::toolkit::Toolkit;

/// MCP tool implementation for Linux host administration over SSH.
///
/// Cheap to clone: every clone shares the same session registry.
#[derive(Clone)]
pub struct McpLinuxTools {
    toolkit: Arc<Toolkit>,
}

impl McpLinuxTools {
    pub fn new(toolkit: Arc<Toolkit>) -> Self {
        Self { toolkit }
    }

    /// Tools backed by russh, configured from the environment and MCP config files.
    pub fn from_environment() -> Self {
        Self::new(Arc::new(Toolkit::from_environment()))
    }

    /// Close every interactive session. Call once the server has stopped.
    pub async fn shutdown(&self) {
        self.toolkit.shutdown().await;
    }
}

#[Tools]
impl McpLinuxTools {
    /// Create a persistent interactive SSH session.
    ///
    /// The session keeps its shell state (working directory, environment,
    /// running programs) between calls and is identified by its host.
    /// Missing arguments fall back to the HOST, USERNAME, PASSWORD and PORT
    /// environment variables, then to the MCP configuration file.
    async fn create_interactive_session(
        &self,
        /// Host name or IP address (default: HOST from the environment or MCP config)
        ip_address: Option<String>,
        /// SSH username (default: USERNAME, then "root")
        username: Option<String>,
        /// SSH password (default: PASSWORD; a private key is tried when the password is rejected)
        password: Option<String>,
        /// SSH port (default: PORT, then 22)
        port: Option<u16>,
    ) -> Text<String> {
        Text(
            self.toolkit
                .create_interactive_session(ip_address, username, password, port)
                .await,
        )
    }

    /// Execute a command in the existing interactive session for a host.
    ///
    /// Returns when the command finishes or the timeout elapses, whichever
    /// comes first. A command still running at the timeout keeps running;
    /// use `get_real_time_output` to follow it.
    async fn execute_interactive_command(
        &self,
        /// Host of a session opened with `create_interactive_session`
        ip_address: String,
        /// Command line to type into the shell
        command: String,
        /// Seconds to wait for the command to finish (default: 30, env: SSH_COMMAND_TIMEOUT)
        timeout: Option<u64>,
    ) -> Text<String> {
        Text(
            self.toolkit
                .execute_interactive_command(ip_address, command, timeout)
                .await,
        )
    }

    /// Send input to an interactive session, e.g. to answer a prompt, and return what follows.
    async fn send_interactive_input(
        &self,
        /// Host of an existing session
        ip_address: String,
        /// Text to send, a newline is appended
        input_text: String,
    ) -> Text<String> {
        Text(
            self.toolkit
                .send_interactive_input(ip_address, input_text)
                .await,
        )
    }

    /// Collect the output an interactive session produces over a period of time.
    async fn get_real_time_output(
        &self,
        /// Host of an existing session
        ip_address: String,
        /// Seconds to collect output for (default: 5)
        duration: Option<u64>,
    ) -> Text<String> {
        Text(
            self.toolkit
                .get_real_time_output(ip_address, duration)
                .await,
        )
    }

    /// List interactive sessions with their state and creation time.
    async fn list_active_sessions(&self) -> Text<String> {
        Text(self.toolkit.list_active_sessions())
    }

    /// Close the interactive session for a host.
    async fn close_session(
        &self,
        /// Host of the session to close
        ip_address: String,
    ) -> Text<String> {
        Text(self.toolkit.close_session(ip_address).await)
    }

    /// Execute a single command over a fresh SSH connection and return its exit code and output.
    async fn execute_command(
        &self,
        /// Command to run
        command: String,
        /// Host to run it on (default: HOST from the environment or MCP config)
        ip_address: Option<String>,
        /// Seconds before the command is abandoned (default: 30, env: SSH_COMMAND_TIMEOUT)
        timeout: Option<u64>,
    ) -> Text<String> {
        Text(
            self.toolkit
                .execute_command(command, ip_address, timeout)
                .await,
        )
    }

    /// Read, write, list or test files on a remote host.
    ///
    /// `read` returns at most 3000 characters. `write` replaces the file with
    /// `content` followed by a newline.
    async fn file_operations(
        &self,
        /// One of: read, write, list, exists
        operation: String,
        /// Remote path
        path: String,
        /// Host (default: HOST from the environment or MCP config)
        ip_address: Option<String>,
        /// Content for the write operation
        content: Option<String>,
    ) -> Text<String> {
        Text(
            self.toolkit
                .file_operations(operation, path, ip_address, content)
                .await,
        )
    }

    /// Check that the configured default host accepts SSH logins and show who and where you are.
    async fn connect_default_host(&self) -> Text<String> {
        Text(self.toolkit.connect_default_host().await)
    }

    /// Ping a host from the machine running this server.
    async fn ping_host(
        &self,
        /// Host to ping (default: HOST from the environment or MCP config)
        host: Option<String>,
        /// Number of echo requests (default: 4)
        count: Option<u32>,
    ) -> Text<String> {
        Text(self.toolkit.ping_host(host, count).await)
    }

    /// Kernel, OS release, memory, disk and top processes of a host.
    async fn quick_system_info(
        &self,
        /// Host (default: HOST from the environment or MCP config)
        ip_address: Option<String>,
    ) -> Text<String> {
        Text(self.toolkit.quick_system_info(ip_address).await)
    }

    /// Start, stop, restart, enable, disable or query a systemd service.
    async fn service_control(
        &self,
        /// Host running the service
        ip_address: String,
        /// Unit name, e.g. "nginx"
        service: String,
        /// One of: start, stop, restart, status, enable, disable
        action: String,
    ) -> Text<String> {
        Text(
            self.toolkit
                .service_control(ip_address, service, action)
                .await,
        )
    }

    /// Interfaces, listening sockets and firewall status of a host.
    async fn network_info(
        &self,
        /// Host to inspect
        ip_address: String,
    ) -> Text<String> {
        Text(self.toolkit.network_info(ip_address).await)
    }

    /// Processes, process count and service state matching a name.
    async fn monitor_process(
        &self,
        /// Host to inspect
        ip_address: String,
        /// Process or service name
        process_name: String,
    ) -> Text<String> {
        Text(
            self.toolkit
                .monitor_process(ip_address, process_name)
                .await,
        )
    }
}
