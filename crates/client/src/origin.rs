//! Origin filter: decides which requests the worker may touch.
//!
//! Only URLs sharing the scope's origin (scheme, host and port) are ever
//! intercepted. Anything that fails to parse is treated as cross-origin so it
//! passes through untouched.

use crate::fetch::{UrlError, resolve};
use boitage_core::Error;
use url::{Origin, Url};

/// Outcome of the origin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginClass {
    /// Same origin as the scope; carries the resolved URL.
    SameOrigin(Url),
    CrossOrigin,
}

/// The app's base URL and the origin derived from it.
#[derive(Debug, Clone)]
pub struct Scope {
    base: Url,
    origin: Origin,
}

impl Scope {
    pub fn new(base: Url) -> Self {
        let origin = base.origin();
        Self { base, origin }
    }

    pub fn parse(base: &str) -> Result<Self, Error> {
        let base = Url::parse(base).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
        Ok(Self::new(base))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a scope-relative URL.
    pub fn resolve(&self, input: &str) -> Result<Url, UrlError> {
        resolve(&self.base, input)
    }

    /// Classify a request URL against the scope's origin.
    pub fn classify(&self, input: &str) -> OriginClass {
        match self.resolve(input) {
            Ok(url) if url.origin() == self.origin => OriginClass::SameOrigin(url),
            Ok(_) => OriginClass::CrossOrigin,
            Err(e) => {
                tracing::debug!(url = input, error = %e, "unparseable request URL, not intercepting");
                OriginClass::CrossOrigin
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::parse("https://letters.example/app/").unwrap()
    }

    #[test]
    fn test_relative_is_same_origin() {
        let class = scope().classify("./letter_moderne.html");
        assert_eq!(
            class,
            OriginClass::SameOrigin(Url::parse("https://letters.example/app/letter_moderne.html").unwrap())
        );
    }

    #[test]
    fn test_same_host_outside_scope_path_is_same_origin() {
        assert!(matches!(scope().classify("https://letters.example/elsewhere"), OriginClass::SameOrigin(_)));
    }

    #[test]
    fn test_other_host_is_cross_origin() {
        assert_eq!(scope().classify("https://cdn.jsdelivr.net/npm/html2pdf.js"), OriginClass::CrossOrigin);
    }

    #[test]
    fn test_other_scheme_or_port_is_cross_origin() {
        assert_eq!(scope().classify("http://letters.example/app/"), OriginClass::CrossOrigin);
        assert_eq!(scope().classify("https://letters.example:8443/app/"), OriginClass::CrossOrigin);
    }

    #[test]
    fn test_default_port_is_same_origin() {
        assert!(matches!(scope().classify("https://letters.example:443/app/"), OriginClass::SameOrigin(_)));
    }

    #[test]
    fn test_malformed_is_cross_origin() {
        assert_eq!(scope().classify("http://[::1"), OriginClass::CrossOrigin);
        assert_eq!(scope().classify(""), OriginClass::CrossOrigin);
        assert_eq!(scope().classify("data:text/plain,hi"), OriginClass::CrossOrigin);
    }
}
