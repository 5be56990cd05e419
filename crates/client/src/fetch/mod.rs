//! HTTP fetch pipeline: the only path from the worker to the network.
//!
//! ### Network seam
//! - [`Network`] is the trait every responder fetches through.
//! - [`FetchClient`] is the `reqwest` implementation.
//!
//! ### Cache modes
//! - `Default`: plain request.
//! - `NoStore`: asks every transport-level cache to stay out of the way
//!   (`Cache-Control: no-store`, `Pragma: no-cache`).
//!
//! ### Failures
//! - Any transport error (offline, DNS, TLS, timeout) is `NetworkFailure`.
//! - Non-2xx statuses are *responses*, not failures.
//! - Max body bytes: 5MB (configurable), larger bodies are `FetchTooLarge`.

pub mod url;

use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Url};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve};

use crate::request::{Request, Response};
use boitage_core::{AppConfig, Error};

/// Transport cache behavior for a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
}

/// Something that can turn a request into a response.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch a request.
    ///
    /// `Ok` for any status the server answered with; `Err` only when no
    /// response was obtained.
    async fn fetch(&self, request: &Request, cache: CacheMode) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "boitage/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "boitage/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request, cache: CacheMode) -> Result<Response, Error> {
        let start = Instant::now();
        let url = Url::parse(&request.url).map_err(|e| Error::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if cache == CacheMode::NoStore {
            builder = builder
                .header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
                .header(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("{}: {}", url, e)))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response { url: final_url, status, headers, body })
    }
}
