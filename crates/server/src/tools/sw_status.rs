//! sw_status and sw_deploy tool implementations.

use crate::tools::json_result;

use boitage_client::{Registration, Status};
use boitage_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the sw_deploy tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwDeployParams {
    /// Version label to install and activate.
    pub version: String,
}

/// Output from the sw_deploy tool.
#[derive(Debug, Clone, Serialize)]
pub struct SwDeployOutput {
    /// Number of manifest entries written to the new generation.
    pub precached: usize,
    /// Generations deleted on activation.
    pub purged: Vec<String>,
    #[serde(flatten)]
    pub status: Status,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let status = registration.status().await?;
    json_result(&status)
}

/// Implementation of the sw_deploy tool.
///
/// A failed precache still leaves the new version in control; the error is
/// returned so the caller knows the generation is incomplete.
pub async fn deploy_impl(registration: &Registration, params: SwDeployParams) -> Result<CallToolResult, McpError> {
    let version = params.version.trim();
    if version.is_empty() {
        return Err(Error::InvalidInput("version must not be empty".into()).into());
    }

    let deployment = registration.deploy(version).await?;
    tracing::info!(
        version = %deployment.version,
        generation = %deployment.generation,
        precached = deployment.precached,
        "deployed"
    );

    let output = SwDeployOutput {
        precached: deployment.precached,
        purged: deployment.purged,
        status: registration.status().await?,
    };
    json_result(&output)
}
