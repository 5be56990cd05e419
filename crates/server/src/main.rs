//! boitage-sw server entry point.
//!
//! Loads configuration, brings the configured version into control and
//! serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use boitage_client::{FetchClient, FetchConfig, Registration, WorkerSettings};
use boitage_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(version = %config.version, scope = %config.scope, "Starting boitage-sw on stdio transport");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from(&config)).context("building http client")?;
    let settings = WorkerSettings::from_config(&config)?;

    let registration = Registration::register(settings, &config.version, db, Arc::new(network)).await?;

    let handler = handler::BoitageServer::new(Arc::new(registration));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
