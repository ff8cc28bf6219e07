//! One-shot command execution over a fresh connection.
//!
//! Nothing here touches the session registry: each run connects,
//! authenticates, executes one command through the exec primitive and
//! disconnects again, whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::mcp::error::SessionError;
use crate::mcp::transport::{ConnectionTarget, Connector};
use crate::mcp::types::CommandOutput;

#[derive(Clone)]
pub struct OneShotExecutor {
    connector: Arc<dyn Connector>,
}

impl OneShotExecutor {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Run `command` on `target`. Timing out is reported in the output, not as an error.
    pub async fn run(
        &self,
        target: &ConnectionTarget,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SessionError> {
        let connection = self.connector.connect(target).await?;
        debug!("Running one-shot command on {}: {}", target.host, command);

        let result = connection.exec(command, timeout).await;

        if let Err(e) = connection.close().await {
            debug!("Error closing one-shot connection to {}: {}", target.host, e);
        }

        if let Ok(output) = &result {
            info!(
                "One-shot command on {} exited with {}{}",
                target.host,
                output.exit_code,
                if output.timed_out { " (timed out)" } else { "" }
            );
        }
        result
    }
}
