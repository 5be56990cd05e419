//! Request classifier: HTML documents vs. static assets.

use crate::request::{Request, RequestMode};

/// Which responder handles a same-origin GET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Navigations and anything accepting `text/html`: network-first.
    Html,
    /// Scripts, styles, fonts, images: cache-first.
    Asset,
}

/// Classify a request. Callers only pass GET requests.
pub fn classify(request: &Request) -> RequestClass {
    if request.mode == RequestMode::Navigate || request.accept().contains("text/html") {
        RequestClass::Html
    } else {
        RequestClass::Asset
    }
}
