// ABOUTME: Server binary entry point - configuration, logging, and serving
// ABOUTME: Boots the gateway from the environment and runs until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

use anyhow::Result;
use clap::Parser;
use mcphub_server::gateway::ServerResources;
use mcphub_server::logging::LoggingConfig;
use std::sync::Arc;

/// Multi-tenant MCP gateway
#[derive(Parser, Debug)]
#[command(name = "mcphub-server", version, about)]
struct Args {
    /// Override the HTTP listen port (default: HTTP_PORT env or 8000)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    LoggingConfig::from_env().init()?;

    let mut resources =
        ServerResources::from_env().map_err(|e| anyhow::anyhow!(e.message))?;
    if let Some(port) = args.port {
        resources.config.http_port = port;
    }

    mcphub_server::gateway::serve(Arc::new(resources)).await
}
