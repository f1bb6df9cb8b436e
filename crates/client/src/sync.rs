//! Replay of queued writes once connectivity is back.

use serde::Serialize;
use tether_core::{Error, SubmissionQueue};

use crate::fetch::Network;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Replay every pending submission, oldest first.
///
/// A 2xx answer removes the submission; anything else (transport error or
/// non-2xx status) leaves it queued with its attempt count incremented.
/// Queue storage errors abort the pass; deliveries already confirmed stay
/// removed.
pub async fn drain(queue: &dyn SubmissionQueue, network: &dyn Network) -> Result<DrainReport, Error> {
    let pending = queue.pending().await?;
    let mut report = DrainReport::default();

    if pending.is_empty() {
        tracing::debug!("no pending submissions");
        return Ok(report);
    }

    tracing::info!(count = pending.len(), "draining pending submissions");

    for submission in pending {
        let failure = match network.fetch(&submission.to_request()).await {
            Ok(response) if response.is_success() => None,
            Ok(response) => Some(format!("status {}", response.status)),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                queue.remove(submission.id).await?;
                report.succeeded += 1;
                tracing::debug!(id = submission.id, endpoint = %submission.target_endpoint, "submission delivered");
            }
            Some(reason) => {
                queue.record_failure(submission.id).await?;
                report.failed += 1;
                let err = Error::QueueDeliveryFailure { id: submission.id, reason };
                tracing::warn!(attempts = submission.attempt_count + 1, "{}", err);
            }
        }
    }

    tracing::info!(succeeded = report.succeeded, failed = report.failed, "drain finished");
    Ok(report)
}
