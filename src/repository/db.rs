//! Database Connection and Setup
//!
//! Manages the SQLite connection and schema migrations.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

/// Connection shared by the repositories
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Database state wrapper
#[derive(Clone)]
pub struct DbState {
    conn: SharedConnection,
}

impl DbState {
    /// Handle to hand to a repository
    pub fn connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }
}

/// Open the database at `db_path` (`:memory:` for tests) and migrate it
pub fn init_db(db_path: &Path) -> DomainResult<DbState> {
    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Internal(format!("Failed to open {}: {}", db_path.display(), e)))?;

    run_migrations(&conn)?;
    log::info!("Database ready at {}", db_path.display());

    Ok(DbState {
        conn: Arc::new(Mutex::new(conn)),
    })
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    // One JSON document per key, versioned independently
    conn.execute(
        "CREATE TABLE IF NOT EXISTS persisted_state (
            key TEXT PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0,
            payload TEXT NOT NULL
        )",
        [],
    )?;

    if !column_exists(conn, "persisted_state", "updated_at")? {
        conn.execute("ALTER TABLE persisted_state ADD COLUMN updated_at INTEGER", [])
            .map_err(|e| DomainError::Internal(format!("Failed to add updated_at: {}", e)))?;
    }

    // Raw payloads replaced by a schema migration
    conn.execute(
        "CREATE TABLE IF NOT EXISTS persisted_state_backup (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL,
            version INTEGER NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_state_backup_key ON persisted_state_backup(key)",
        [],
    )?;

    Ok(())
}
