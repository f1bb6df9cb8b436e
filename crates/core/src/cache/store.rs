//! The namespace store interface the strategies are written against.

use async_trait::async_trait;

use crate::Error;
use crate::http::Response;

/// Named key→response mappings with insertion-ordered keys.
///
/// Implementations must keep an entry's insertion position when `put`
/// overwrites an existing key, and must refuse responses with status >= 300.
/// Each call is atomic on its own; there are no multi-call transactions.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a snapshot.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Response>, Error>;

    /// Insert or replace a snapshot, creating the namespace on first write.
    async fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<(), Error>;

    /// Remove one entry. Returns whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, Error>;

    /// Keys in insertion order, oldest first.
    async fn keys(&self, namespace: &str) -> Result<Vec<String>, Error>;

    /// Names of every existing namespace.
    async fn namespaces(&self) -> Result<Vec<String>, Error>;

    /// Drop a namespace and all of its entries. Returns whether it existed.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error>;

    async fn len(&self, namespace: &str) -> Result<usize, Error> {
        Ok(self.keys(namespace).await?.len())
    }

    /// Remove the `count` oldest entries. Returns how many were removed.
    async fn evict_oldest(&self, namespace: &str, count: usize) -> Result<usize, Error> {
        let keys = self.keys(namespace).await?;
        let mut removed = 0;
        for key in keys.iter().take(count) {
            if self.delete(namespace, key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Reject responses the store must never hold.
pub(crate) fn check_storable(response: &Response) -> Result<(), Error> {
    if response.status >= 300 { Err(Error::NonSuccessResponse(response.status)) } else { Ok(()) }
}
