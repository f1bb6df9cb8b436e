//! Core types and shared functionality for tether.
//!
//! This crate provides:
//! - Request/response model shared by the store, queue and network layers
//! - Cache namespace store with SQLite and in-memory backends
//! - FIFO eviction for bounded namespaces
//! - Pending-write queue for mutating requests that could not be delivered
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod queue;

pub use cache::{CacheDb, CacheStore, MemoryStore, NamespaceKind, Namespaces, VersionTag};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Headers, Method, Request, Response};
pub use queue::{MemoryQueue, NewSubmission, PendingSubmission, SubmissionQueue};
