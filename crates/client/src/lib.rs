//! Client side of boitage: everything between a request and the cache.
//!
//! This crate provides the network fetcher, the origin filter and request
//! classifier, the network-first and cache-first responders, and the worker
//! lifecycle that ties them to a versioned cache generation.

pub mod classify;
pub mod fetch;
pub mod origin;
pub mod request;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use reqwest::{Method, StatusCode, Url, header};

pub use classify::{RequestClass, classify};
pub use fetch::{CacheMode, FetchClient, FetchConfig, Network};
pub use origin::{OriginClass, Scope};
pub use request::{Request, RequestMode, Response};
pub use strategy::{Outcome, Source};
pub use worker::{Deployment, Phase, Registration, Status, Worker, WorkerSettings};
