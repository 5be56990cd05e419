//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::sw_fetch::{SwFetchParams, fetch_impl};
use crate::tools::sw_status::{SwDeployParams, deploy_impl, status_impl};

use boitage_client::Registration;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use std::sync::Arc;

/// The main MCP server handler for boitage.
#[derive(Clone)]
pub struct BoitageServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl BoitageServer {
    /// Create a new server handler around a registration.
    pub fn new(registration: Arc<Registration>) -> Self {
        Self { tool_router: Self::tool_router(), registration }
    }

    /// Resolve a request through the offline cache layer.
    ///
    /// Same-origin GET requests are answered network-first (pages) or
    /// cache-first (assets); everything else goes straight to the network.
    #[tool(
        description = "Fetch a URL through the offline cache. Returns status, headers, body and where it was served from (network, cache, fallback, passthrough)."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, params.0).await
    }

    #[tool(description = "Report the controlling version, its phase and the stored cache generations.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    /// Install and activate a new version label.
    #[tool(
        description = "Install a new version: precache the manifest into a fresh generation, activate it and delete older generations."
    )]
    async fn sw_deploy(&self, params: Parameters<SwDeployParams>) -> Result<CallToolResult, McpError> {
        deploy_impl(&self.registration, params.0).await
    }

    #[tool(description = "Show the stored entry for a URL in the current cache generation.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.registration, params.0).await
    }

    #[tool(description = "Delete a stale cache generation. The current generation cannot be purged.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.registration, params.0).await
    }
}

impl ServerHandler for BoitageServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "boitage-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
