//! Tool-level errors for the boitage server.
//!
//! Cache and network failures use `boitage_core::Error`; these cover what
//! only exists at the tool boundary.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors raised by tool handlers.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A parameter could not be turned into a request.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("OUTPUT_FAILED: {0}")]
    OutputFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::OutputFailed(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_codes() {
        let err: McpError = ToolError::InvalidInput("method".into()).into();
        assert_eq!(err.code.0, -32602);
        let err: McpError = ToolError::OutputFailed("json".into()).into();
        assert_eq!(err.code.0, -32603);
    }
}
