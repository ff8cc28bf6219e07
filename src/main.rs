#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::time::Duration;

use dotenv::dotenv;
use linux_mcp_toolkit::mcp::McpLinuxTools;
use linux_mcp_toolkit::mcp::config::resolve_mcp_port;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use tracing::{info, warn};

/// Grace period for in-flight requests once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let mcp_addr = format!("0.0.0.0:{}", resolve_mcp_port(None));
    info!("Starting MCP server on {}", mcp_addr);

    // One toolkit for every MCP client, so sessions outlive a single connection
    let tools = McpLinuxTools::from_environment();
    let endpoint_tools = tools.clone();
    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| McpServer::new().tools(endpoint_tools.clone())),
        )
        .with(Tracing);

    info!("Linux MCP toolkit is ready");
    info!("Use create_interactive_session for persistent shells, execute_command for one-off commands");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down");
    };

    let result = Server::new(TcpListener::bind(mcp_addr))
        .name("Linux MCP Toolkit")
        .run_with_graceful_shutdown(app, shutdown, Some(SHUTDOWN_GRACE))
        .await;

    tools.shutdown().await;
    result?;

    Ok(())
}
