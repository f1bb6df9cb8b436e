//! In-memory pending-write queue.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{NewSubmission, PendingSubmission, SubmissionQueue};
use crate::Error;

#[derive(Default)]
struct State {
    last_id: i64,
    entries: BTreeMap<i64, PendingSubmission>,
}

/// Queue kept in process memory; ids are monotonic for the queue's lifetime.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionQueue for MemoryQueue {
    async fn enqueue(&self, submission: NewSubmission) -> Result<PendingSubmission, Error> {
        let mut state = self.state.lock().await;
        state.last_id += 1;
        let pending = PendingSubmission {
            id: state.last_id,
            method: submission.method,
            target_endpoint: submission.target_endpoint,
            content_type: submission.content_type,
            payload: submission.payload,
            created_at: chrono::Utc::now().to_rfc3339(),
            attempt_count: 0,
        };
        state.entries.insert(pending.id, pending.clone());
        Ok(pending)
    }

    async fn pending(&self) -> Result<Vec<PendingSubmission>, Error> {
        let state = self.state.lock().await;
        Ok(state.entries.values().cloned().collect())
    }

    async fn remove(&self, id: i64) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        Ok(state.entries.remove(&id).is_some())
    }

    async fn record_failure(&self, id: i64) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.get_mut(&id) {
            entry.attempt_count += 1;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.state.lock().await.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use url::Url;

    fn submission() -> NewSubmission {
        NewSubmission {
            method: Method::Put,
            target_endpoint: Url::parse("https://example.com/api/profile").unwrap(),
            content_type: None,
            payload: "data".into(),
        }
    }

    #[tokio::test]
    async fn test_fifo_and_monotonic_ids() {
        let queue = MemoryQueue::new();
        let a = queue.enqueue(submission()).await.unwrap();
        let b = queue.enqueue(submission()).await.unwrap();
        queue.remove(b.id).await.unwrap();
        let c = queue.enqueue(submission()).await.unwrap();

        assert!(c.id > b.id);
        let ids: Vec<i64> = queue.pending().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[tokio::test]
    async fn test_record_failure_increments() {
        let queue = MemoryQueue::new();
        let a = queue.enqueue(submission()).await.unwrap();
        queue.record_failure(a.id).await.unwrap();
        assert_eq!(queue.pending().await.unwrap()[0].attempt_count, 1);
        assert_eq!(queue.len().await.unwrap(), 1);
    }
}
