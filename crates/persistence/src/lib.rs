//! Persistence layer for the transit alarm engine.
//!
//! This crate contains:
//! - The key-value store interface and its in-memory and file-backed implementations
//! - Entity definitions (the JSON shapes written to storage)
//! - Repository implementations for alarm and geofence-region snapshots

pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use error::PersistenceError;
pub use store::{FileStore, InMemoryStore, KeyValueStore};
