//! In-memory namespace store.
//!
//! Same contract as the SQLite store; used by tests and by hosts that do not
//! need the cache to outlive the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{CacheStore, check_storable};
use crate::Error;
use crate::http::Response;

struct StoredEntry {
    seq: u64,
    response: Response,
}

#[derive(Default)]
struct State {
    next_seq: u64,
    namespaces: HashMap<String, HashMap<String, StoredEntry>>,
}

/// Namespace store backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Response>, Error> {
        let state = self.state.read().await;
        Ok(state
            .namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .map(|entry| entry.response.clone()))
    }

    async fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<(), Error> {
        check_storable(response)?;

        let mut state = self.state.write().await;
        state.next_seq += 1;
        let seq = state.next_seq;
        let entries = state.namespaces.entry(namespace.to_string()).or_default();
        match entries.get_mut(key) {
            Some(existing) => existing.response = response.clone(),
            None => {
                entries.insert(key.to_string(), StoredEntry { seq, response: response.clone() });
            }
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        Ok(state
            .namespaces
            .get_mut(namespace)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        let Some(entries) = state.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut ordered: Vec<(&String, u64)> = entries.iter().map(|(key, entry)| (key, entry.seq)).collect();
        ordered.sort_by_key(|(_, seq)| *seq);
        Ok(ordered.into_iter().map(|(key, _)| key.clone()).collect())
    }

    async fn namespaces(&self) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.namespaces.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        Ok(state.namespaces.remove(namespace).is_some())
    }

    async fn len(&self, namespace: &str) -> Result<usize, Error> {
        let state = self.state.read().await;
        Ok(state.namespaces.get(namespace).map_or(0, HashMap::len))
    }
}
