//! Request and response values crossing the interception boundary.

use boitage_core::{Error, StoredResponse};
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

/// An outbound request seen by the worker.
///
/// The URL is kept as given; it is resolved against the scope only once the
/// request is intercepted.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub mode: RequestMode,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), mode: RequestMode::default(), headers: HeaderMap::new() }
    }

    /// A plain GET, as issued by `fetch(url)`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// A top-level navigation to a document.
    pub fn navigate(url: impl Into<String>) -> Self {
        let mut request = Self::get(url);
        request.mode = RequestMode::Navigate;
        request
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"));
        request
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_url(&self, url: &Url) -> Self {
        Self { url: url.to_string(), ..self.clone() }
    }

    /// The `Accept` header, empty when absent or not valid text.
    pub fn accept(&self) -> &str {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// A complete response with its body buffered.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Copy of this response in the store's representation.
    ///
    /// Headers that are not valid text are not persisted.
    pub fn to_stored(&self) -> StoredResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        StoredResponse::new(self.url.as_str(), self.status.as_u16(), headers, self.body.to_vec())
    }

    /// Rebuild a response from a stored entry.
    pub fn from_stored(stored: StoredResponse) -> Result<Self, Error> {
        let url = Url::parse(&stored.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", stored.url)))?;
        let status = StatusCode::from_u16(stored.status)
            .map_err(|e| Error::CorruptEntry(format!("{}: {e}", stored.url)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &stored.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, url = %stored.url, "skipping unreadable stored header"),
            }
        }

        Ok(Self { url, status, headers, body: Bytes::from(stored.body) })
    }
}
