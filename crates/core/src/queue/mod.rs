//! Pending-write queue.
//!
//! Mutating requests that could not reach the origin are captured here and
//! replayed when the host signals that connectivity is back. Entries leave
//! the queue only after a confirmed delivery.

pub mod memory;
pub mod pending;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::http::{Method, Request};

pub use memory::MemoryQueue;

/// A captured write awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    /// Unique, monotonic, never reused.
    pub id: i64,
    pub method: Method,
    pub target_endpoint: Url,
    pub content_type: Option<String>,
    pub payload: Bytes,
    /// RFC 3339 capture time.
    pub created_at: String,
    pub attempt_count: u32,
}

impl PendingSubmission {
    /// Rebuild the request to replay against the origin.
    pub fn to_request(&self) -> Request {
        let mut request = Request::new(self.method, self.target_endpoint.clone()).with_body(self.payload.clone());
        if let Some(content_type) = &self.content_type {
            request = request.with_header("content-type", content_type.clone());
        }
        request
    }
}

/// A write to capture; the queue assigns id, timestamp and attempt count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub method: Method,
    pub target_endpoint: Url,
    pub content_type: Option<String>,
    pub payload: Bytes,
}

impl NewSubmission {
    /// Capture a failed mutating request.
    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method,
            target_endpoint: request.url.clone(),
            content_type: request.header("content-type").map(str::to_string),
            payload: request.body.clone().unwrap_or_default(),
        }
    }
}

/// Durable FIFO of pending submissions.
#[async_trait]
pub trait SubmissionQueue: Send + Sync {
    /// Append a submission with a fresh id.
    async fn enqueue(&self, submission: NewSubmission) -> Result<PendingSubmission, Error>;

    /// All pending submissions, oldest first.
    async fn pending(&self) -> Result<Vec<PendingSubmission>, Error>;

    /// Remove a delivered submission. Returns whether it existed.
    async fn remove(&self, id: i64) -> Result<bool, Error>;

    /// Count a failed delivery attempt.
    async fn record_failure(&self, id: i64) -> Result<(), Error>;

    async fn len(&self) -> Result<usize, Error> {
        Ok(self.pending().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_and_replay_request() {
        let url = Url::parse("https://example.com/api/contact").unwrap();
        let request = Request::new(Method::Post, url.clone())
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"name":"Ada"}"#);

        let captured = NewSubmission::from_request(&request);
        assert_eq!(captured.method, Method::Post);
        assert_eq!(captured.content_type.as_deref(), Some("application/json"));

        let pending = PendingSubmission {
            id: 1,
            method: captured.method,
            target_endpoint: captured.target_endpoint,
            content_type: captured.content_type,
            payload: captured.payload,
            created_at: chrono::Utc::now().to_rfc3339(),
            attempt_count: 0,
        };
        let replay = pending.to_request();
        assert_eq!(replay.method, Method::Post);
        assert_eq!(replay.url, url);
        assert_eq!(replay.header("content-type"), Some("application/json"));
        assert_eq!(replay.body.as_deref(), Some(br#"{"name":"Ada"}"#.as_slice()));
    }

    #[test]
    fn test_capture_without_body() {
        let url = Url::parse("https://example.com/api/items/3").unwrap();
        let captured = NewSubmission::from_request(&Request::new(Method::Delete, url));
        assert!(captured.payload.is_empty());
        assert!(captured.content_type.is_none());
    }
}
