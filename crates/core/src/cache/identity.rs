//! Request identities and their storage keys.

use sha2::{Digest, Sha256};
use url::Url;

/// The lookup key of a cache entry: method plus the full URL.
///
/// The query string is part of the identity and is never normalized:
/// assets are versioned with `?v=...` and each value is its own entry.
/// Fragments are dropped since they never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: String,
    url: Url,
}

impl RequestIdentity {
    /// Identity of a request with an arbitrary method.
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url }
    }

    /// Identity of a GET request, the only kind the store ever holds.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Content-addressed storage key: SHA-256 of `"{METHOD}\n{url}"`.
    pub fn key_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
