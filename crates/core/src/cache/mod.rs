//! SQLite-backed versioned response cache.
//!
//! This module provides the persistent store behind the offline layer using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named generations, one per deployed version label
//! - Request identities keyed by SHA-256 of method and full URL (query included)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Cascading purge of stale generations

pub mod connection;
pub mod entries;
pub mod generations;
pub mod identity;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredResponse;
pub use generations::{Generation, GenerationInfo};
pub use identity::RequestIdentity;
