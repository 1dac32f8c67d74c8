//! Connection setup and schema.

use log::debug;
use rusqlite::Connection;
use std::path::Path;

use crate::errors::StorageError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sync_state_kv (
    state_key TEXT PRIMARY KEY,
    state_value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

/// Opens (creating if needed) the database file and applies the schema.
pub fn open_connection(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path).map_err(|source| StorageError::Open {
        path: path.display().to_string(),
        source,
    })?;
    init_schema(&conn)?;
    debug!("Opened sync state database at {}", path.display());
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
        path: ":memory:".to_string(),
        source,
    })?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
