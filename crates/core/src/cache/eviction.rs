//! Capacity enforcement for bounded namespaces.
//!
//! Oldest-inserted entries go first. Position is fixed at first insertion, so
//! a key that is revalidated often is still evicted once it is the oldest.

use super::store::CacheStore;
use crate::Error;

/// Trim `namespace` down to `max_entries`, removing the oldest keys.
///
/// Returns the number of removed entries. Called right after a write that may
/// have grown the namespace; never runs on its own.
pub async fn enforce_limit(store: &dyn CacheStore, namespace: &str, max_entries: usize) -> Result<usize, Error> {
    let size = store.len(namespace).await?;
    if size <= max_entries {
        return Ok(0);
    }

    let overflow = size - max_entries;
    let removed = store.evict_oldest(namespace, overflow).await?;
    tracing::debug!(namespace, removed, max_entries, "evicted oldest entries");
    Ok(removed)
}
