//! MCP tool implementations.
//!
//! This module contains all tools exposed by the boitage server.

pub mod cache;
pub mod sw_fetch;
pub mod sw_status;

use crate::error::ToolError;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Wrap a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::OutputFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
