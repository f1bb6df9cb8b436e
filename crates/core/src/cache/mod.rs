//! Versioned cache namespaces holding response snapshots.
//!
//! This module provides the namespace store the strategies read and write:
//!
//! - `CacheStore` trait with SQLite (`CacheDb`) and in-memory (`MemoryStore`) backends
//! - Namespace naming tied to a deploy's `VersionTag`
//! - Upsert that keeps an entry's insertion position (FIFO, not LRU)
//! - Oldest-first eviction for bounded namespaces
//! - Automatic schema migrations and WAL mode for the SQLite backend

pub mod connection;
pub mod entries;
pub mod eviction;
pub mod key;
pub mod memory;
pub mod migrations;
pub mod namespace;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use eviction::enforce_limit;
pub use key::request_key;
pub use memory::MemoryStore;
pub use namespace::{NamespaceKind, Namespaces, VersionTag, namespace_name, parse_namespace};
pub use store::CacheStore;
