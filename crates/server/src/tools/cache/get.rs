//! cache_get tool implementation.
//!
//! Looks up the stored entry for a URL in the current generation.

use crate::tools::json_result;

use boitage_client::Registration;
use boitage_core::{Error, RequestIdentity};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or a URL relative to the scope.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: usize,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(registration: &Registration, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = registration
        .settings()
        .scope
        .resolve(&params.url)
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let worker = registration
        .controller()
        .await
        .ok_or_else(|| Error::CacheMiss("no active generation".into()))?;
    let generation = worker.generation();

    let stored = generation
        .match_request(&RequestIdentity::get(&url))
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{url} in {}", generation.name())))?;

    let output = CacheGetOutput {
        generation: generation.name().to_string(),
        content_type: stored.header("content-type").map(str::to_string),
        bytes: stored.body.len(),
        url: stored.url,
        status: stored.status,
        stored_at: stored.stored_at,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{registration, text};

    #[tokio::test]
    async fn test_get_impl_missing() {
        let (registration, _db) = registration(&[]).await;
        let params = CacheGetParams { url: "./app.css".into() };

        let err = get_impl(&registration, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let (registration, _db) = registration(&[("index.html", "<h1>Lettres</h1>")]).await;
        let params = CacheGetParams { url: "https://letters.example/app/index.html#top".into() };

        let result = get_impl(&registration, params).await.unwrap();
        let output: CacheGetOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.generation, "boitage-tel-v1");
        assert_eq!(output.status, 200);
        assert_eq!(output.bytes, "<h1>Lettres</h1>".len());
        assert_eq!(output.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_get_impl_query_is_part_of_key() {
        let (registration, _db) = registration(&[("index.html", "<h1>Lettres</h1>")]).await;
        let params = CacheGetParams { url: "./index.html?draft=1".into() };

        assert!(get_impl(&registration, params).await.is_err());
    }
}
