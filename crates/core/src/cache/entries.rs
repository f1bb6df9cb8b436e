//! SQLite-backed namespace store.
//!
//! Entries carry an explicit `seq` assigned on first insertion; upserts leave
//! it untouched, so `keys` (ordered by `seq`) is the FIFO eviction order.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::store::{CacheStore, check_storable};
use crate::Error;
use crate::http::{Headers, Response};

#[async_trait]
impl CacheStore for CacheDb {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Response>, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status_code, headers_json, body FROM entries WHERE namespace = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![namespace, key], |row| {
                    Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
                });

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers: Headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(Response { status, headers, body: body.into() }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics: a new key gets the next sequence number, an
    /// existing key has its snapshot replaced and keeps its sequence number.
    async fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<(), Error> {
        check_storable(response)?;

        let namespace = namespace.to_string();
        let key = key.to_string();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![namespace, now],
                )?;
                tx.execute(
                    "INSERT INTO entries (namespace, key, seq, status_code, headers_json, body, stored_at)
                    VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries), ?3, ?4, ?5, ?6)
                    ON CONFLICT(namespace, key) DO UPDATE SET
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![namespace, key, status, headers_json, body, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE namespace = ?1 ORDER BY seq ASC")?;
                let keys = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries go with the namespace row through `ON DELETE CASCADE`.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![namespace])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn len(&self, namespace: &str) -> Result<usize, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    async fn evict_oldest(&self, namespace: &str, count: usize) -> Result<usize, Error> {
        let namespace = namespace.to_string();
        let limit = count as i64;
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND key IN (
                    SELECT key FROM entries WHERE namespace = ?1 ORDER BY seq ASC LIMIT ?2
                )",
                    params![namespace, limit],
                )?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }
}
