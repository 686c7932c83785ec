//! Generation lifecycle operations.
//!
//! A generation is one versioned snapshot of the key -> response store.
//! Versions come from the deployed shell version and only ever move
//! forward. Activation is a single transaction that deletes every older
//! generation (entries cascade) and promotes the new one, so readers see
//! the swap atomically.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// One versioned cache generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: i64,
    pub version: i64,
    pub live: bool,
    pub created_at: String,
}

impl CacheDb {
    /// Create (or reset) the generation for the given version.
    ///
    /// The generation starts not-live; installers write shell entries into
    /// it before `activate_generation` promotes it. If a previous install
    /// attempt for the same version was abandoned, its row is reused and
    /// its leftover entries are wiped, so a retried install starts clean.
    pub async fn create_generation(&self, version: i64) -> Result<Generation, Error> {
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Generation, Error> {
                let tx = conn.transaction().map_err(Error::from)?;

                tx.execute(
                    "INSERT INTO generations (version, live, created_at) VALUES (?1, 0, ?2)
                     ON CONFLICT(version) DO UPDATE SET created_at = excluded.created_at",
                    params![version, created_at],
                )?;
                tx.execute(
                    "DELETE FROM entries WHERE generation_id = (SELECT id FROM generations WHERE version = ?1)",
                    params![version],
                )?;

                let generation = tx
                    .query_row(
                        "SELECT id, version, live, created_at FROM generations WHERE version = ?1",
                        params![version],
                        row_to_generation,
                    )
                    .map_err(Error::from)?;

                tx.commit().map_err(Error::from)?;
                Ok(generation)
            })
            .await
            .map_err(Error::from)
    }

    /// Promote a generation to live, deleting every older one.
    ///
    /// Runs in one transaction: demote the current live generation, delete
    /// all generations with a lower version (their entries cascade), then
    /// mark the given version live. Returns the number of generations
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownGeneration` if no generation has the given
    /// version.
    pub async fn activate_generation(&self, version: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction().map_err(Error::from)?;

                let exists: bool = tx
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM generations WHERE version = ?1)",
                        params![version],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                if !exists {
                    return Err(Error::UnknownGeneration(version));
                }

                tx.execute("UPDATE generations SET live = 0 WHERE live = 1", [])?;
                let deleted = tx.execute("DELETE FROM generations WHERE version < ?1", params![version])?;
                tx.execute("UPDATE generations SET live = 1 WHERE version = ?1", params![version])?;

                tx.commit().map_err(Error::from)?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// The single live generation, if one has been activated yet.
    pub async fn live_generation(&self) -> Result<Option<Generation>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<Generation>, Error> {
                let result = conn.query_row(
                    "SELECT id, version, live, created_at FROM generations WHERE live = 1",
                    [],
                    row_to_generation,
                );

                match result {
                    Ok(g) => Ok(Some(g)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// All generation versions currently in the store, ascending.
    pub async fn generation_versions(&self) -> Result<Vec<i64>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<i64>, Error> {
                let mut stmt = conn.prepare("SELECT version FROM generations ORDER BY version ASC")?;
                let versions = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(versions)
            })
            .await
            .map_err(Error::from)
    }
}

fn row_to_generation(row: &rusqlite::Row<'_>) -> Result<Generation, rusqlite::Error> {
    Ok(Generation {
        id: row.get(0)?,
        version: row.get(1)?,
        live: row.get::<_, i64>(2)? == 1,
        created_at: row.get(3)?,
    })
}
