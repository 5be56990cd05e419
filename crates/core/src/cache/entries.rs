//! Entry operations within a generation.
//!
//! Lookups are exact on the request identity, query string included.
//! Writes are upserts: the last `put` for an identity wins.

use super::generations::Generation;
use super::identity::RequestIdentity;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A response as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// URL the response was fetched from.
    pub url: String,
    pub status: u16,
    /// Header pairs in the order they were received.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
}

impl StoredResponse {
    /// Build a response stamped with the current time.
    pub fn new(url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { url: url.into(), status, headers, body, stored_at: chrono::Utc::now().to_rfc3339() }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

const UPSERT: &str = "INSERT INTO entries (
        generation, key_hash, method, url, status_code, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(generation, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status_code = excluded.status_code,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

struct Row {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl Row {
    fn encode(identity: &RequestIdentity, response: &StoredResponse) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            key_hash: identity.key_hash(),
            method: identity.method().to_string(),
            url: identity.url().to_string(),
            status: response.status,
            headers_json,
            body: response.body.clone(),
            stored_at: response.stored_at.clone(),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection, generation: &str) -> Result<(), Error> {
        conn.execute(
            UPSERT,
            params![
                generation,
                &self.key_hash,
                &self.method,
                &self.url,
                self.status,
                &self.headers_json,
                &self.body,
                &self.stored_at,
            ],
        )?;
        Ok(())
    }
}

impl Generation {
    /// Store or overwrite the response for an identity.
    ///
    /// Fails if the generation has been deleted in the meantime.
    pub async fn put(&self, identity: &RequestIdentity, response: &StoredResponse) -> Result<(), Error> {
        let row = Row::encode(identity, response)?;
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> { row.insert(conn, &generation) })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of entries in one transaction: all of them or none.
    pub async fn put_all(&self, entries: Vec<(RequestIdentity, StoredResponse)>) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(identity, response)| Row::encode(identity, response))
            .collect::<Result<Vec<_>, _>>()?;
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.insert(&tx, &generation)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for an exact identity.
    pub async fn match_request(&self, identity: &RequestIdentity) -> Result<Option<StoredResponse>, Error> {
        let key_hash = identity.key_hash();
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT url, status_code, headers_json, body, stored_at
                         FROM entries WHERE generation = ?1 AND key_hash = ?2",
                        params![generation, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, u16>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, Vec<u8>>(3)?,
                                row.get::<_, String>(4)?,
                            ))
                        },
                    )
                    .optional()?;

                match row {
                    Some((url, status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;
                        Ok(Some(StoredResponse { url, status, headers, body, stored_at }))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by this generation.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every stored entry, sorted.
    pub async fn urls(&self) -> Result<Vec<String>, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url")?;
                let rows = stmt.query_map(params![generation], |row| row.get(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }
}
