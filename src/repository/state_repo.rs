//! Persisted State Repository
//!
//! Stores a whole document as JSON under its key, with the schema version
//! alongside. Older payloads are migrated, then backed up raw and written
//! back in one transaction.

use std::marker::PhantomData;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::domain::{DomainError, DomainResult};
use super::db::SharedConnection;
use super::traits::{StateRepository, VersionedState};

pub struct JsonStateRepository<T> {
    conn: SharedConnection,
    _state: PhantomData<fn() -> T>,
}

impl<T: VersionedState> JsonStateRepository<T> {
    pub fn new(conn: SharedConnection) -> Self {
        Self {
            conn,
            _state: PhantomData,
        }
    }

    /// Stored schema version, if anything is stored
    pub async fn stored_version(&self) -> DomainResult<Option<i64>> {
        let conn = self.conn.lock().await;
        let version = conn
            .query_row(
                "SELECT version FROM persisted_state WHERE key = ?1",
                params![T::KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Number of raw payloads kept aside by migrations
    pub async fn backup_count(&self) -> DomainResult<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM persisted_state_backup WHERE key = ?1",
            params![T::KEY],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn write_state<T: VersionedState>(conn: &rusqlite::Connection, state: &T) -> DomainResult<()> {
    let payload = serde_json::to_string(state)
        .map_err(|e| DomainError::Internal(format!("Failed to serialize {}: {}", T::KEY, e)))?;
    conn.execute(
        "INSERT OR REPLACE INTO persisted_state (key, version, payload, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![T::KEY, T::VERSION, payload, now_millis()],
    )?;
    Ok(())
}

#[async_trait]
impl<T: VersionedState> StateRepository<T> for JsonStateRepository<T> {
    async fn load(&self) -> DomainResult<T> {
        let mut conn = self.conn.lock().await;

        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT version, payload FROM persisted_state WHERE key = ?1",
                params![T::KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((version, payload)) = row else {
            return Ok(T::default());
        };

        if version == T::VERSION {
            return serde_json::from_str(&payload).map_err(|e| {
                DomainError::InvalidInput(format!("Stored {} is unreadable: {}", T::KEY, e))
            });
        }

        if version > T::VERSION {
            return Err(DomainError::Conflict(format!(
                "{} was written by schema version {}, this build reads up to {}",
                T::KEY,
                version,
                T::VERSION
            )));
        }

        // An unparsable old payload migrates like an empty one
        let raw = serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null);
        let migrated = T::migrate(version, raw)?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO persisted_state_backup (key, version, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![T::KEY, version, payload, now_millis()],
        )?;
        write_state(&tx, &migrated)?;
        tx.commit()?;

        log::info!("Migrated {} from version {} to {}", T::KEY, version, T::VERSION);
        Ok(migrated)
    }

    async fn save(&self, state: &T) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        write_state(&conn, state)
    }

    async fn clear(&self) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM persisted_state WHERE key = ?1", params![T::KEY])?;
        Ok(())
    }
}
