//! Cache generations: one named store per deployed version.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// Handle to one named generation.
///
/// Cheap to clone; all handles share the database connection.
#[derive(Clone, Debug)]
pub struct Generation {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Persisted generation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: String,
    pub activated_at: Option<String>,
}

impl CacheDb {
    /// Open the named generation, creating it if absent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Generation { db: self.clone(), name: name.to_string() })
    }

    /// Names of every persisted generation, oldest first.
    pub async fn generations(&self) -> Result<Vec<String>, Error> {
        Ok(self.generation_info().await?.into_iter().map(|g| g.name).collect())
    }

    /// Metadata of every persisted generation, oldest first.
    pub async fn generation_info(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt =
                    conn.prepare("SELECT name, created_at, activated_at FROM generations ORDER BY created_at, name")?;
                let rows = stmt.query_map([], |row| {
                    Ok(GenerationInfo { name: row.get(0)?, created_at: row.get(1)?, activated_at: row.get(2)? })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge a generation and all of its entries.
    ///
    /// Returns whether the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record that a generation finished activation.
    pub async fn mark_activated(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let count =
                    conn.execute("UPDATE generations SET activated_at = ?2 WHERE name = ?1", params![name, now])?;
                if count == 0 {
                    return Err(Error::CacheMiss(format!("generation {name}")));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The most recently activated generation, if any.
    pub async fn activated_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let name = conn
                    .query_row(
                        "SELECT name FROM generations WHERE activated_at IS NOT NULL
                         ORDER BY activated_at DESC LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(name)
            })
            .await
            .map_err(Error::from)
    }
}
