//! Response strategies and the result they hand back to the requester.
//!
//! - [`network_first`] for HTML documents
//! - [`cache_first`] for static assets, with background revalidation
//!
//! Store failures never escape a strategy: a read failure is a miss and a
//! write failure is logged.

pub mod cache_first;
pub mod network_first;
pub mod revalidate;

use crate::request::Response;
use boitage_core::{Error, Generation, RequestIdentity};
use serde::{Deserialize, Serialize};

pub use revalidate::Revalidator;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Fresh from the network through a responder.
    Network,
    /// The stored entry for the request's own identity.
    Cache,
    /// The stored home document, standing in for a failed navigation.
    Fallback,
    /// Not intercepted; fetched as-is with no cache access.
    Passthrough,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Source::Network => "network",
            Source::Cache => "cache",
            Source::Fallback => "fallback",
            Source::Passthrough => "passthrough",
        };
        f.write_str(name)
    }
}

/// What the requester gets back.
#[derive(Debug, Clone)]
pub enum Outcome {
    Served { response: Response, source: Source },
    /// Terminal failure for this request, surfaced as a failed fetch.
    NetworkError(String),
}

impl Outcome {
    pub fn served(response: Response, source: Source) -> Self {
        Outcome::Served { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Served { response, .. } => Some(response),
            Outcome::NetworkError(_) => None,
        }
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            Outcome::Served { source, .. } => Some(*source),
            Outcome::NetworkError(_) => None,
        }
    }

    /// Convert into a `Result`, mapping the network-error result to `Error::NetworkFailure`.
    pub fn into_result(self) -> Result<(Response, Source), Error> {
        match self {
            Outcome::Served { response, source } => Ok((response, source)),
            Outcome::NetworkError(reason) => Err(Error::NetworkFailure(reason)),
        }
    }
}

/// Read an entry, degrading any store problem to a miss.
pub(crate) async fn lookup(generation: &Generation, identity: &RequestIdentity) -> Option<Response> {
    match generation.match_request(identity).await {
        Ok(Some(stored)) => match Response::from_stored(stored) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "unreadable cache entry, treating as miss");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(
                generation = generation.name(),
                identity = %identity,
                error = %e,
                "cache unavailable, treating as miss"
            );
            None
        }
    }
}

/// Write an entry; returns whether it landed.
pub(crate) async fn store(generation: &Generation, identity: &RequestIdentity, response: &Response) -> bool {
    match generation.put(identity, &response.to_stored()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(generation = generation.name(), identity = %identity, error = %e, "cache write failed");
            false
        }
    }
}
