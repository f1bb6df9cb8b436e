//! Request interception and offline resilience for tether.
//!
//! This crate provides the network capability (reqwest-backed), request
//! classification, the caching strategies, install/activate lifecycle,
//! pending-write replay and the [`Worker`] that ties them together.

pub mod classify;
pub mod fetch;
pub mod lifecycle;
pub mod strategy;
pub mod sync;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classify::{Category, classify};
pub use fetch::{FetchClient, FetchConfig, Network, Scope};
pub use lifecycle::{ActivationReport, InstallReport, LifecycleEvent, WorkerState};
pub use strategy::{Limits, StrategyEngine};
pub use sync::DrainReport;
pub use worker::{Action, Event, Outcome, Route, Worker};
