//! sw_fetch tool implementation.
//!
//! Resolves one request through the offline cache layer, the same way the
//! page's own fetches are resolved.

use crate::error::ToolError;
use crate::tools::json_result;

use boitage_client::{Method, Outcome, Registration, Request, header};
use boitage_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL or a URL relative to the scope.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Value of the Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// Treat the request as a page navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body text, omitted for binary content types.
    pub body: Option<String>,
    pub bytes: usize,
    /// Where the response came from: network, cache, fallback or passthrough.
    pub served: String,
}

impl SwFetchParams {
    fn into_request(self) -> Result<Request, ToolError> {
        let method = Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| ToolError::InvalidInput(format!("unsupported method: {}", self.method)))?;

        let mut request = if self.navigate && method == Method::GET {
            Request::navigate(self.url)
        } else {
            Request::new(method, self.url)
        };

        if let Some(accept) = self.accept {
            let value = header::HeaderValue::from_str(&accept)
                .map_err(|e| ToolError::InvalidInput(format!("invalid accept header: {e}")))?;
            request = request.with_header(header::ACCEPT, value);
        }

        Ok(request)
    }
}

fn is_textual(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("json")
        || mime.ends_with("xml")
        || mime.ends_with("javascript")
        || mime == "image/svg+xml"
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(registration: &Registration, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = params.into_request()?;
    let outcome = registration.fetch(request).await;

    let (response, source) = match outcome {
        Outcome::Served { response, source } => (response, source),
        Outcome::NetworkError(reason) => return Err(Error::NetworkFailure(reason).into()),
    };

    let content_type = response.content_type().map(str::to_string);
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body = is_textual(content_type.as_deref()).then(|| response.text());

    tracing::debug!(url = %response.url, status = response.status.as_u16(), served = %source, "sw_fetch");

    let output = SwFetchOutput {
        url: response.url.to_string(),
        status: response.status.as_u16(),
        content_type,
        headers,
        body,
        bytes: response.body.len(),
        served: source.to_string(),
    };

    json_result(&output)
}
