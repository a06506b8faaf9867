//! # Codelore MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to codelore.
//!
//! Reads configuration from environment variables:
//! - `CODELORE_URL` — codelore server URL (default: `http://localhost:8080`)
//! - `CODELORE_API_KEY` — Optional Bearer token for authentication
//!
//! Communicates with AI clients via MCP over stdio and forwards
//! requests to the codelore HTTP API.

mod client;
mod server;

use client::LoreClient;
use rmcp::{ServiceExt, transport::stdio};
use server::LoreMcp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging to stderr only — stdout is reserved for MCP stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("CODELORE_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let api_key = std::env::var("CODELORE_API_KEY").ok();

    tracing::info!("codelore MCP server starting, target: {}", url);

    let client = LoreClient::new(url, api_key);
    let mcp = LoreMcp::new(client);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
