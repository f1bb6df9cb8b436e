//! SQLite-backed pending-write queue.
//!
//! `AUTOINCREMENT` guarantees ids are never reused, even after the newest
//! submission has been delivered and removed.

use async_trait::async_trait;
use tokio_rusqlite::params;
use url::Url;

use super::{NewSubmission, PendingSubmission, SubmissionQueue};
use crate::Error;
use crate::cache::CacheDb;
use crate::http::Method;

struct PendingRow {
    id: i64,
    method: String,
    target_endpoint: String,
    content_type: Option<String>,
    payload: Vec<u8>,
    created_at: String,
    attempt_count: u32,
}

impl PendingRow {
    fn into_submission(self) -> Result<PendingSubmission, Error> {
        let method: Method = self.method.parse()?;
        let target_endpoint = Url::parse(&self.target_endpoint).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(PendingSubmission {
            id: self.id,
            method,
            target_endpoint,
            content_type: self.content_type,
            payload: self.payload.into(),
            created_at: self.created_at,
            attempt_count: self.attempt_count,
        })
    }
}

#[async_trait]
impl SubmissionQueue for CacheDb {
    async fn enqueue(&self, submission: NewSubmission) -> Result<PendingSubmission, Error> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let method = submission.method.as_str();
        let endpoint = submission.target_endpoint.to_string();
        let content_type = submission.content_type.clone();
        let payload = submission.payload.to_vec();
        let stamp = created_at.clone();

        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO pending_submissions (method, target_endpoint, content_type, payload, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![method, endpoint, content_type, payload, stamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(id, endpoint = %submission.target_endpoint, "queued pending submission");

        Ok(PendingSubmission {
            id,
            method: submission.method,
            target_endpoint: submission.target_endpoint,
            content_type: submission.content_type,
            payload: submission.payload,
            created_at,
            attempt_count: 0,
        })
    }

    async fn pending(&self) -> Result<Vec<PendingSubmission>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<PendingRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, method, target_endpoint, content_type, payload, created_at, attempt_count
                    FROM pending_submissions ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(PendingRow {
                            id: row.get(0)?,
                            method: row.get(1)?,
                            target_endpoint: row.get(2)?,
                            content_type: row.get(3)?,
                            payload: row.get(4)?,
                            created_at: row.get(5)?,
                            attempt_count: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter().map(PendingRow::into_submission).collect()
    }

    async fn remove(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM pending_submissions WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn record_failure(&self, id: i64) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE pending_submissions SET attempt_count = attempt_count + 1 WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn len(&self) -> Result<usize, Error> {
        self.conn
            .call(|conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_submissions", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}
