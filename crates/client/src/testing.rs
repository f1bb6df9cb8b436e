//! In-memory network and store doubles for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tether_core::{CacheStore, Error, MemoryStore, Request, Response};

use crate::fetch::Network;

/// Serves canned responses by URL; unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    unreachable: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Make a single URL fail at the transport level.
    pub(crate) fn unreachable(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let url = request.url.as_str();
        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(url) {
            return Err(Error::Network(format!("{url} unreachable")));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

/// Memory store whose writes or namespace listing can be made to fail.
#[derive(Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    puts: AtomicUsize,
    fail_put_at: Mutex<Option<usize>>,
    fail_namespaces: AtomicBool,
}

impl FaultyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The `n`th `put` (1-based) and every later one fail.
    pub(crate) fn fail_put_at(&self, n: usize) {
        *self.fail_put_at.lock().unwrap() = Some(n);
    }

    pub(crate) fn fail_namespaces(&self) {
        self.fail_namespaces.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for FaultyStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Response>, Error> {
        self.inner.get(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<(), Error> {
        let call = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_put_at.lock().unwrap().is_some_and(|n| call >= n) {
            return Err(Error::Serialization(format!("put #{call} refused")));
        }
        self.inner.put(namespace, key, response).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, Error> {
        self.inner.delete(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, Error> {
        self.inner.keys(namespace).await
    }

    async fn namespaces(&self) -> Result<Vec<String>, Error> {
        if self.fail_namespaces.load(Ordering::SeqCst) {
            return Err(Error::Serialization("namespace listing refused".into()));
        }
        self.inner.namespaces().await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        self.inner.delete_namespace(namespace).await
    }
}
