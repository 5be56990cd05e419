//! Core types and shared functionality for boitage.
//!
//! This crate provides:
//! - Versioned response cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, Generation, RequestIdentity, StoredResponse};
pub use config::AppConfig;
pub use error::Error;
