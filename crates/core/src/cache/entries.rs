//! Cached response CRUD.
//!
//! An entry is a stored response (status, headers, body bytes) under a
//! request key, scoped to one generation. Writes are last-write-wins
//! upserts; concurrent writers for the same key are harmless.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response: everything needed to replay it to a caller later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Cache key (see [`super::key::compute_entry_key`]).
    pub key: String,
    /// The canonical URL the response was fetched from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers as (name, value) pairs.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Vec<u8>,
    /// RFC3339 timestamp of the originating fetch.
    pub fetched_at: String,
}

impl CacheDb {
    /// Insert or replace a response under its key in the given generation.
    pub async fn put_entry(&self, generation_id: i64, response: &StoredResponse) -> Result<(), Error> {
        let response = response.clone();
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::Persist(e.to_string()))?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (generation_id, key, url, status, headers_json, body, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(generation_id, key) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        fetched_at = excluded.fetched_at",
                    params![
                        generation_id,
                        &response.key,
                        &response.url,
                        response.status,
                        headers_json,
                        &response.body,
                        &response.fetched_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a response by key from a specific generation.
    pub async fn get_entry(&self, generation_id: i64, key: &str) -> Result<Option<StoredResponse>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, url, status, headers_json, body, fetched_at
                     FROM entries WHERE generation_id = ?1 AND key = ?2",
                )?;
                let result = stmt.query_row(params![generation_id, key], row_to_response);
                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get a response by key from the live generation.
    ///
    /// Returns None when there is no live generation or the key is absent
    /// from it — both read as a cache miss to the interception layer.
    pub async fn get_live(&self, key: &str) -> Result<Option<StoredResponse>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.key, e.url, e.status, e.headers_json, e.body, e.fetched_at
                     FROM entries e
                     JOIN generations g ON g.id = e.generation_id
                     WHERE g.live = 1 AND e.key = ?1",
                )?;
                let result = stmt.query_row(params![key], row_to_response);
                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a generation.
    pub async fn entry_count(&self, generation_id: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE generation_id = ?1",
                    params![generation_id],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

fn row_to_response(row: &rusqlite::Row<'_>) -> Result<StoredResponse, rusqlite::Error> {
    let headers_json: String = row.get(3)?;
    Ok(StoredResponse {
        key: row.get(0)?,
        url: row.get(1)?,
        status: row.get(2)?,
        headers: serde_json::from_str(&headers_json).unwrap_or_default(),
        body: row.get(4)?,
        fetched_at: row.get(5)?,
    })
}
