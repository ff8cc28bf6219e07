//! Tool behaviour behind the MCP surface.
//!
//! [`Toolkit`] owns the session registry, the one-shot executor and the
//! credential resolver. Each public method implements one MCP tool and
//! always answers with text: failures are described, never raised.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{error, info};

use crate::mcp::admin::{
    self, DEFAULT_HOST_PROBE, FileOperation, NETWORK_COMMANDS, SYSTEM_INFO_COMMANDS,
    ServiceAction,
};
use crate::mcp::client::{ConnectSettings, RusshConnector};
use crate::mcp::config::resolve_command_timeout;
use crate::mcp::credentials::{CredentialResolver, CredentialSet};
use crate::mcp::error::SessionError;
use crate::mcp::message::{
    CommandOutputMessageBuilder, SectionedReportBuilder, SessionListMessageBuilder,
    SessionMessageBuilder, ShellCommandMessageBuilder,
};
use crate::mcp::oneshot::OneShotExecutor;
use crate::mcp::ping::{DEFAULT_PING_COUNT, Pinger};
use crate::mcp::registry::SessionRegistry;
use crate::mcp::shell::ShellSettings;
use crate::mcp::transport::Connector;
use crate::mcp::types::CommandOutput;

/// Pause between sending input and reading the response.
pub const INPUT_SETTLE: Duration = Duration::from_secs(1);

/// How long the response to sent input is collected.
pub const INPUT_DRAIN: Duration = Duration::from_secs(2);

pub const DEFAULT_REAL_TIME_SECS: u64 = 5;

pub struct Toolkit {
    registry: SessionRegistry,
    executor: OneShotExecutor,
    resolver: Arc<CredentialResolver>,
    pinger: Pinger,
}

impl Toolkit {
    /// `interactive` opens the long-lived shells, `oneshot` the throwaway connections.
    pub fn new(
        interactive: Arc<dyn Connector>,
        oneshot: Arc<dyn Connector>,
        resolver: Arc<CredentialResolver>,
        settings: ShellSettings,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(interactive, Arc::clone(&resolver), settings),
            executor: OneShotExecutor::new(oneshot),
            resolver,
            pinger: Pinger::default(),
        }
    }

    /// Wire russh connectors, shell settings and credentials from the environment.
    pub fn from_environment() -> Self {
        let resolver = Arc::new(CredentialResolver::from_environment());
        if let Some(host) = resolver.default_host() {
            info!("Default host: {}", host);
        }

        Self::new(
            Arc::new(RusshConnector::new(ConnectSettings::from_env(true))),
            Arc::new(RusshConnector::new(ConnectSettings::from_env(false))),
            resolver,
            ShellSettings::from_env(),
        )
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Close every interactive session.
    pub async fn shutdown(&self) {
        let count = self.registry.len();
        self.registry.close_all().await;
        if count > 0 {
            info!("Closed {} interactive session(s)", count);
        }
    }

    /// Host a reply should name: the explicit one, else the configured default.
    fn display_host(&self, explicit: &CredentialSet) -> String {
        self.resolver
            .layer(explicit)
            .host
            .unwrap_or_else(|| "<no host>".to_string())
    }

    pub async fn create_interactive_session(
        &self,
        ip_address: Option<String>,
        username: Option<String>,
        password: Option<String>,
        port: Option<u16>,
    ) -> String {
        let explicit = CredentialSet::explicit(ip_address, username, password, port);

        match self.registry.get_or_create(&explicit).await {
            Ok(acquired) => {
                let session = acquired.session.lock().await;
                let target = session.target();
                SessionMessageBuilder::new(&target.host)
                    .with_user(&target.username, target.port)
                    .acquisition(acquired.acquisition)
                    .build()
            }
            Err(SessionError::MissingHost) => format!("❌ {}", SessionError::MissingHost),
            Err(e) => {
                let host = self.display_host(&explicit);
                error!("Failed to create interactive session for {}: {}", host, e);
                format!("Failed to create interactive session for {}: {}", host, e)
            }
        }
    }

    pub async fn execute_interactive_command(
        &self,
        ip_address: String,
        command: String,
        timeout_secs: Option<u64>,
    ) -> String {
        let timeout = resolve_command_timeout(timeout_secs);

        let shared = match self.registry.get_existing(&ip_address).await {
            Ok(session) => session,
            Err(e @ SessionError::NoActiveSession { .. }) => return e.to_string(),
            Err(e) => return format!("Command execution failed: {}", e),
        };

        let mut session = shared.lock().await;
        match session.execute(&command, timeout).await {
            Ok(execution) => ShellCommandMessageBuilder::new(&command, execution.output)
                .with_exit_code(execution.exit_code)
                .timed_out((!execution.completed).then_some(timeout))
                .build(),
            Err(e) => {
                error!("Interactive command failed on {}: {}", session.host(), e);
                format!("Command execution failed: {}", e)
            }
        }
    }

    pub async fn send_interactive_input(&self, ip_address: String, input_text: String) -> String {
        let shared = match self.registry.get_existing(&ip_address).await {
            Ok(session) => session,
            Err(e) => return e.to_string(),
        };

        let mut session = shared.lock().await;
        if let Err(e) = session.send_input(&input_text).await {
            return format!("Failed to send input: {}", e);
        }

        tokio::time::sleep(INPUT_SETTLE).await;
        match session.drain_real_time(INPUT_DRAIN).await {
            Ok(response) => format!("Input sent: {}\nResponse:\n{}", input_text, response),
            // The drain ran but the shell went away underneath it
            Err(e) => format!("Input sent: {}\nResponse unavailable: {}", input_text, e),
        }
    }

    pub async fn get_real_time_output(&self, ip_address: String, duration_secs: Option<u64>) -> String {
        let secs = duration_secs.unwrap_or(DEFAULT_REAL_TIME_SECS);
        let shared = match self.registry.get_existing(&ip_address).await {
            Ok(session) => session,
            Err(e) => return e.to_string(),
        };

        let mut session = shared.lock().await;
        match session.drain_real_time(Duration::from_secs(secs)).await {
            Ok(output) => format!("Real-time output ({}s):\n{}", secs, output),
            Err(e) => format!("Failed to read output: {}", e),
        }
    }

    pub fn list_active_sessions(&self) -> String {
        SessionListMessageBuilder::new(&self.registry.list()).build()
    }

    pub async fn close_session(&self, ip_address: String) -> String {
        if self.registry.close(&ip_address).await {
            format!("Session for {} closed", ip_address)
        } else {
            format!("No active session for {}", ip_address)
        }
    }

    /// Resolve the target for `ip_address` and run `command` over a fresh connection.
    async fn run_one_shot(
        &self,
        ip_address: Option<String>,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SessionError> {
        let target = self.resolver.resolve(&CredentialSet::for_host(ip_address))?;
        self.executor.run(&target, command, timeout).await
    }

    pub async fn execute_command(
        &self,
        command: String,
        ip_address: Option<String>,
        timeout_secs: Option<u64>,
    ) -> String {
        let timeout = resolve_command_timeout(timeout_secs);
        match self.run_one_shot(ip_address, &command, timeout).await {
            Ok(output) => CommandOutputMessageBuilder::new(&output)
                .with_timeout(timeout)
                .build(),
            Err(e) => {
                error!("One-shot command failed: {}", e);
                format!("Command execution failed: {}", e)
            }
        }
    }

    pub async fn file_operations(
        &self,
        operation: String,
        path: String,
        ip_address: Option<String>,
        content: Option<String>,
    ) -> String {
        let operation = match operation.parse::<FileOperation>() {
            Ok(operation) => operation,
            Err(supported) => return supported,
        };
        let command = match admin::file_command(operation, &path, content.as_deref()) {
            Ok(command) => command,
            Err(reason) => return reason,
        };

        let output = match self
            .run_one_shot(ip_address, &command, resolve_command_timeout(None))
            .await
        {
            Ok(output) => output,
            Err(e) => return format!("File operation failed: {}", e),
        };

        if output.exit_code != 0 && output.stdout.is_empty() {
            return format!(
                "File operation failed: {}",
                output.stderr.trim_end()
            );
        }

        match operation {
            FileOperation::Read => admin::truncate_output(&output.stdout),
            FileOperation::Write => format!("File written to: {}", path),
            FileOperation::List => output.stdout,
            FileOperation::Exists => output.stdout.trim().to_string(),
        }
    }

    pub async fn connect_default_host(&self) -> String {
        let Some(host) = self.resolver.default_host() else {
            return format!("❌ {}", SessionError::MissingHost);
        };

        match self
            .run_one_shot(Some(host.clone()), DEFAULT_HOST_PROBE, resolve_command_timeout(None))
            .await
        {
            Ok(output) => format!(
                "✅ Connected to {}\nSystem information:\n{}",
                host, output.stdout
            ),
            Err(e) => {
                error!("Default host probe failed: {}", e);
                format!("❌ Failed to connect to {}: {}", host, e)
            }
        }
    }

    pub async fn ping_host(&self, host: Option<String>, count: Option<u32>) -> String {
        let host = host
            .filter(|h| !h.trim().is_empty())
            .or_else(|| self.resolver.default_host());
        match host {
            Some(host) => {
                self.pinger
                    .ping(&host, count.unwrap_or(DEFAULT_PING_COUNT))
                    .await
            }
            None => format!("❌ {}", SessionError::MissingHost),
        }
    }

    /// Run `commands` concurrently, each over its own connection, one section per command.
    async fn sectioned_report(&self, ip_address: Option<String>, commands: &[String]) -> String {
        let runs = commands
            .iter()
            .map(|command| self.execute_command(command.clone(), ip_address.clone(), None));
        let results = join_all(runs).await;

        commands
            .iter()
            .zip(results)
            .fold(SectionedReportBuilder::new(), |report, (command, result)| {
                report.section(command, result)
            })
            .build()
    }

    pub async fn quick_system_info(&self, ip_address: Option<String>) -> String {
        let commands: Vec<String> = SYSTEM_INFO_COMMANDS.iter().map(|c| c.to_string()).collect();
        self.sectioned_report(ip_address, &commands).await
    }

    pub async fn service_control(&self, ip_address: String, service: String, action: String) -> String {
        match action.parse::<ServiceAction>() {
            Ok(action) => {
                self.execute_command(admin::service_command(&service, action), Some(ip_address), None)
                    .await
            }
            Err(reason) => reason,
        }
    }

    pub async fn network_info(&self, ip_address: String) -> String {
        let commands: Vec<String> = NETWORK_COMMANDS.iter().map(|c| c.to_string()).collect();
        self.sectioned_report(Some(ip_address), &commands).await
    }

    pub async fn monitor_process(&self, ip_address: String, process_name: String) -> String {
        self.sectioned_report(Some(ip_address), &admin::monitor_commands(&process_name))
            .await
    }
}
