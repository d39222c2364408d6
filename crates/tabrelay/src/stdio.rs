//! Stdio MCP transport.
//!
//! stdout carries JSON-RPC frames, so nothing else may write there.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tracing::info;

use crate::handler::BrowserTools;
use crate::relay::Relay;

/// Serve the browser tools over stdin/stdout until EOF.
pub async fn run(relay: Arc<Relay>) -> Result<()> {
    let service = BrowserTools::new(relay)
        .serve(stdio())
        .await
        .context("Failed to start stdio MCP service")?;

    info!("Stdio MCP server running");

    service.waiting().await?;

    info!("Stdio MCP server shutdown");
    Ok(())
}
