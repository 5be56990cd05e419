//! Cache-first responder for static assets (stale-while-revalidate).
//!
//! A hit is served at once and refreshed in the background; a miss goes to
//! the network and is stored when the status is OK.

use super::{Outcome, Revalidator, Source, lookup, store};
use crate::fetch::{CacheMode, Network};
use crate::request::Request;
use boitage_core::{Generation, RequestIdentity};
use std::sync::Arc;

pub async fn respond(
    network: &Arc<dyn Network>, generation: &Generation, revalidator: &Revalidator, request: &Request,
    identity: &RequestIdentity,
) -> Outcome {
    if let Some(cached) = lookup(generation, identity).await {
        revalidator.spawn(revalidate(network.clone(), generation.clone(), request.clone(), identity.clone()));
        return Outcome::served(cached, Source::Cache);
    }

    match network.fetch(request, CacheMode::Default).await {
        Ok(fresh) => {
            if fresh.is_ok() {
                store(generation, identity, &fresh).await;
            }
            Outcome::served(fresh, Source::Network)
        }
        Err(e) => {
            tracing::debug!(identity = %identity, error = %e, "asset not cached and network failed");
            Outcome::NetworkError(e.to_string())
        }
    }
}

/// Refresh one entry for next time. Never reports back.
async fn revalidate(network: Arc<dyn Network>, generation: Generation, request: Request, identity: RequestIdentity) {
    match network.fetch(&request, CacheMode::Default).await {
        Ok(fresh) if fresh.is_ok() => {
            if store(&generation, &identity, &fresh).await {
                tracing::trace!(identity = %identity, "revalidated");
            }
        }
        Ok(fresh) => {
            tracing::debug!(identity = %identity, status = fresh.status.as_u16(), "revalidation not OK, keeping entry");
        }
        Err(e) => {
            tracing::debug!(identity = %identity, error = %e, "revalidation failed");
        }
    }
}
