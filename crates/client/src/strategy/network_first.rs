//! Network-first responder for HTML documents.
//!
//! Order: network (no transport cache) → stored copy → home document →
//! network error. A fresh response is stored whatever its status.

use super::{Outcome, Source, lookup, store};
use crate::fetch::{CacheMode, Network};
use crate::request::Request;
use boitage_core::{Generation, RequestIdentity};

pub async fn respond(
    network: &dyn Network, generation: &Generation, request: &Request, identity: &RequestIdentity,
    fallback: &RequestIdentity,
) -> Outcome {
    let error = match network.fetch(request, CacheMode::NoStore).await {
        Ok(fresh) => {
            store(generation, identity, &fresh).await;
            return Outcome::served(fresh, Source::Network);
        }
        Err(e) => e,
    };

    tracing::debug!(identity = %identity, error = %error, "network failed for document, trying cache");

    if let Some(cached) = lookup(generation, identity).await {
        return Outcome::served(cached, Source::Cache);
    }

    if let Some(home) = lookup(generation, fallback).await {
        tracing::debug!(identity = %identity, fallback = %fallback, "serving fallback document");
        return Outcome::served(home, Source::Fallback);
    }

    Outcome::NetworkError(error.to_string())
}
