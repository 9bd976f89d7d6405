//! # urldex MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to urldex.
//!
//! Reads configuration from environment variables:
//! - `URLDEX_URL` — urldex server URL (default: `http://localhost:8080`)
//!
//! Communicates with AI clients (Claude, GPT) via MCP over stdio,
//! and forwards requests to the urldex HTTP API.

mod client;
mod server;

use client::UrldexClient;
use rmcp::{ServiceExt, transport::stdio};
use server::UrldexMcp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging to stderr only — stdout is reserved for MCP stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("URLDEX_URL").unwrap_or_else(|_| "http://localhost:8080".into());

    tracing::info!("urldex MCP server starting, target: {}", url);

    let client = UrldexClient::new(url);
    let mcp = UrldexMcp::new(client);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
