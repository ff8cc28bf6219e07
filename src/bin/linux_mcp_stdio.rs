#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use linux_mcp_toolkit::mcp::McpLinuxTools;
use poem_mcpserver::McpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Stdout carries the protocol, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let tools = McpLinuxTools::from_environment();
    let result = poem_mcpserver::stdio::stdio(McpServer::new().tools(tools.clone())).await;

    tools.shutdown().await;
    result?;
    Ok(())
}
