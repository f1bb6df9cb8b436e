//! Retrieval strategies.
//!
//! | Category    | Strategy                | Namespace |
//! |-------------|-------------------------|-----------|
//! | Document    | network-first, fallback | dynamic   |
//! | StaticAsset | cache-first             | static    |
//! | Image       | stale-while-revalidate  | images    |
//! | Api         | network-first           | dynamic   |
//! | Generic     | network-first           | dynamic   |
//!
//! Only status 200 responses are written. Store failures never fail a
//! response: writes are logged and dropped, reads count as misses.

pub mod placeholder;

use std::sync::Arc;

use tether_core::cache::{enforce_limit, request_key};
use tether_core::{AppConfig, CacheStore, Error, Method, Namespaces, Request, Response};

use crate::classify::Category;
use crate::fetch::Network;

/// Capacities of the bounded namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub dynamic: usize,
    pub images: usize,
}

impl From<&AppConfig> for Limits {
    fn from(config: &AppConfig) -> Self {
        Self { dynamic: config.max_dynamic_entries, images: config.max_image_entries }
    }
}

/// Runs the per-category strategies against a store and a network.
#[derive(Clone)]
pub struct StrategyEngine {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    namespaces: Namespaces,
    limits: Limits,
    offline_page: Option<String>,
}

impl StrategyEngine {
    pub fn new(store: Arc<dyn CacheStore>, network: Arc<dyn Network>, namespaces: Namespaces, limits: Limits) -> Self {
        Self { store, network, namespaces, limits, offline_page: None }
    }

    /// Cache key of an app-shell page to serve when a document is offline.
    pub fn with_offline_page(mut self, key: impl Into<String>) -> Self {
        self.offline_page = Some(key.into());
        self
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Dispatch to the strategy bound to `category`.
    pub async fn run(&self, category: Category, request: &Request) -> Result<Response, Error> {
        match category {
            Category::Document => Ok(self.network_first_document(request).await),
            Category::StaticAsset => self.cache_first(request).await,
            Category::Image => Ok(self.stale_while_revalidate(request).await),
            Category::Api => self.network_first_api(request).await,
            Category::Generic => self.network_first_generic(request).await,
        }
    }

    /// Live document, else its cached copy, else an offline page. Never fails.
    pub async fn network_first_document(&self, request: &Request) -> Response {
        let key = request_key(request.method, &request.url);
        let namespace = &self.namespaces.dynamic;

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.write(namespace, &key, &response).await;
                }
                return response;
            }
            Err(e) => tracing::debug!(%key, error = %e, "document fetch failed, falling back to cache"),
        }

        if let Some(cached) = self.lookup(namespace, &key).await {
            return cached;
        }

        if let Some(page) = &self.offline_page
            && let Some(cached) = self.lookup(&self.namespaces.app_shell, page).await
        {
            tracing::debug!(%key, %page, "serving offline app-shell page");
            return cached;
        }

        tracing::debug!(%key, "serving generated offline page");
        placeholder::offline_page()
    }

    /// Static namespace first; the network is only consulted on a miss.
    pub async fn cache_first(&self, request: &Request) -> Result<Response, Error> {
        let key = request_key(request.method, &request.url);
        let namespace = &self.namespaces.app_shell;

        if let Some(cached) = self.lookup(namespace, &key).await {
            tracing::debug!(%key, "static cache hit");
            return Ok(cached);
        }

        tracing::debug!(%key, "static cache miss");
        let response = self.network.fetch(request).await?;
        if response.status == 200 {
            self.write(namespace, &key, &response).await;
        }
        Ok(response)
    }

    /// Serve a cached image at once and refresh it in the background.
    ///
    /// The refresh is a detached task: it outlives the caller and its
    /// failures are only logged. A miss with no network yields a placeholder.
    pub async fn stale_while_revalidate(&self, request: &Request) -> Response {
        let key = request_key(request.method, &request.url);
        let namespace = &self.namespaces.images;

        if let Some(cached) = self.lookup(namespace, &key).await {
            tracing::debug!(%key, "image cache hit, revalidating");
            self.spawn_revalidation(request.clone(), key);
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.write(namespace, &key, &response).await;
                }
                response
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "image unavailable, serving placeholder");
                placeholder::image()
            }
        }
    }

    pub async fn network_first_api(&self, request: &Request) -> Result<Response, Error> {
        self.network_first(request).await
    }

    pub async fn network_first_generic(&self, request: &Request) -> Result<Response, Error> {
        self.network_first(request).await
    }

    /// Live response, else the dynamic copy, else the network error.
    async fn network_first(&self, request: &Request) -> Result<Response, Error> {
        if request.method != Method::Get {
            return self.network.fetch(request).await;
        }

        let key = request_key(request.method, &request.url);
        let namespace = &self.namespaces.dynamic;

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.write(namespace, &key, &response).await;
                }
                Ok(response)
            }
            Err(e) => match self.lookup(namespace, &key).await {
                Some(cached) => {
                    tracing::debug!(%key, error = %e, "network failed, serving cached copy");
                    Ok(cached)
                }
                None => Err(e),
            },
        }
    }

    fn spawn_revalidation(&self, request: Request, key: String) {
        let store = Arc::clone(&self.store);
        let network = Arc::clone(&self.network);
        let namespace = self.namespaces.images.clone();
        let limit = self.limits.images;

        tokio::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.status == 200 => {
                    write_through(store.as_ref(), &namespace, &key, &response, Some(limit)).await;
                    tracing::debug!(%key, "image revalidated");
                }
                Ok(response) => tracing::debug!(%key, status = response.status, "revalidation skipped"),
                Err(e) => tracing::debug!(%key, error = %e, "revalidation failed"),
            }
        });
    }

    fn limit_for(&self, namespace: &str) -> Option<usize> {
        if namespace == self.namespaces.dynamic {
            Some(self.limits.dynamic)
        } else if namespace == self.namespaces.images {
            Some(self.limits.images)
        } else {
            None
        }
    }

    async fn write(&self, namespace: &str, key: &str, response: &Response) {
        write_through(self.store.as_ref(), namespace, key, response, self.limit_for(namespace)).await;
    }

    async fn lookup(&self, namespace: &str, key: &str) -> Option<Response> {
        match self.store.get(namespace, key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(namespace, key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }
}

/// Store a copy and, for bounded namespaces, trim to capacity.
async fn write_through(store: &dyn CacheStore, namespace: &str, key: &str, response: &Response, limit: Option<usize>) {
    if let Err(e) = store.put(namespace, key, response).await {
        tracing::warn!(namespace, key, error = %e, "cache write failed");
        return;
    }

    if let Some(max_entries) = limit
        && let Err(e) = enforce_limit(store, namespace, max_entries).await
    {
        tracing::warn!(namespace, error = %e, "eviction failed");
    }
}
