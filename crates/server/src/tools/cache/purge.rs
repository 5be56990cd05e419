//! cache_purge tool implementation.
//!
//! Deletes a stale cache generation and every entry in it.

use crate::tools::json_result;

use boitage_client::Registration;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Name of the generation to delete.
    pub generation: String,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub purged: String,
    /// Generations left after the purge.
    pub remaining: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(registration: &Registration, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    registration.purge(&params.generation).await?;

    let remaining = registration
        .status()
        .await?
        .generations
        .into_iter()
        .map(|g| g.name)
        .collect();

    json_result(&CachePurgeOutput { purged: params.generation, remaining })
}
