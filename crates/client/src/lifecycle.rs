//! Install and activate.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Active
//!               |                          |
//!               v                          v
//!           Redundant                  Installed (retry)
//! ```
//!
//! Install fetches every manifest asset before writing any of them, so the
//! static namespace is either fully populated or untouched. Activate removes
//! namespaces left behind by other versions and then claims clients.

use std::fmt;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use url::Url;

use tether_core::cache::{parse_namespace, request_key};
use tether_core::{CacheStore, Error, Method, Request, Response, VersionTag};

use crate::fetch::Network;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Notification published to subscribed clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Installed { version: String, assets: usize },
    InstallFailed { version: String, reason: String },
    Activated { version: String, deleted: Vec<String> },
    ActivationFailed { version: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Keys written to the static namespace.
    pub cached: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Namespaces removed during cleanup.
    pub deleted: Vec<String>,
    pub claimed: bool,
}

/// Drives one worker version through install and activation.
pub struct Lifecycle {
    state: Mutex<WorkerState>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    version: VersionTag,
    owner_prefix: Option<String>,
    app_shell: String,
    manifest: Vec<Url>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        version: VersionTag,
        app_shell: String,
        manifest: Vec<Url>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(WorkerState::Parsed),
            store,
            network,
            version,
            owner_prefix: None,
            app_shell,
            manifest,
            events,
        }
    }

    /// Restrict activation cleanup to versions starting with `prefix`.
    pub fn with_owner_prefix(mut self, prefix: Option<String>) -> Self {
        self.owner_prefix = prefix;
        self
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Pre-cache the manifest. Any failure makes the worker redundant.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;
        tracing::info!(version = %self.version, assets = self.manifest.len(), "installing");

        match self.precache().await {
            Ok(cached) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(version = %self.version, assets = cached.len(), "installed");
                self.publish(LifecycleEvent::Installed { version: self.version.to_string(), assets: cached.len() });
                Ok(InstallReport { cached })
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::warn!(version = %self.version, error = %e, "install failed");
                self.publish(LifecycleEvent::InstallFailed { version: self.version.to_string(), reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Remove stale namespaces and take control of clients.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;

        match self.cleanup().await {
            Ok(deleted) => {
                self.set_state(WorkerState::Active).await;
                tracing::info!(version = %self.version, deleted = deleted.len(), "activated, clients claimed");
                self.publish(LifecycleEvent::Activated { version: self.version.to_string(), deleted: deleted.clone() });
                Ok(ActivationReport { deleted, claimed: true })
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                tracing::warn!(version = %self.version, error = %e, "activation failed");
                self.publish(LifecycleEvent::ActivationFailed {
                    version: self.version.to_string(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<Vec<String>, Error> {
        let fetches = self.manifest.iter().map(|url| self.fetch_asset(url));
        let assets = try_join_all(fetches).await?;

        let mut cached = Vec::with_capacity(assets.len());
        for (key, response) in &assets {
            if let Err(e) = self.store.put(&self.app_shell, key, response).await {
                self.rollback(&cached).await;
                return Err(Error::InstallAssetFailure { key: key.clone(), reason: e.to_string() });
            }
            cached.push(key.clone());
        }
        Ok(cached)
    }

    async fn fetch_asset(&self, url: &Url) -> Result<(String, Response), Error> {
        let key = request_key(Method::Get, url);
        let response = self
            .network
            .fetch(&Request::get(url.clone()))
            .await
            .map_err(|e| Error::InstallAssetFailure { key: key.clone(), reason: e.to_string() })?;

        if response.status != 200 {
            return Err(Error::InstallAssetFailure { key, reason: format!("status {}", response.status) });
        }
        Ok((key, response))
    }

    async fn rollback(&self, written: &[String]) {
        for key in written {
            if let Err(e) = self.store.delete(&self.app_shell, key).await {
                tracing::warn!(%key, error = %e, "rollback of pre-cached asset failed");
            }
        }
    }

    async fn cleanup(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.namespaces().await? {
            if self.is_stale(&name) && self.store.delete_namespace(&name).await? {
                tracing::debug!(namespace = %name, "deleted stale namespace");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// A namespace is stale when it follows the `{tag}-{kind}` pattern, its
    /// tag differs from ours and, if an owner prefix is set, carries it.
    fn is_stale(&self, name: &str) -> bool {
        let Some((tag, _)) = parse_namespace(name) else {
            return false;
        };
        if tag == self.version {
            return false;
        }
        match &self.owner_prefix {
            Some(prefix) => tag.as_str().starts_with(prefix.as_str()),
            None => true,
        }
    }

    async fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if *state != expected {
            return Err(Error::InvalidState { expected: expected.to_string(), actual: state.to_string() });
        }
        *state = next;
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.lock().await = next;
    }

    fn publish(&self, event: LifecycleEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
