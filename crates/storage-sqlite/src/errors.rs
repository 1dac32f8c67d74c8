//! Storage errors and their mapping onto the core error type.

use civic_ledger_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection lock is poisoned")]
    LockPoisoned,
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Open { .. } => Error::Database(DatabaseError::Open(err.to_string())),
            StorageError::Sqlite(inner) => Error::Database(DatabaseError::Query(inner.to_string())),
            StorageError::LockPoisoned => {
                Error::Database(DatabaseError::Internal(err.to_string()))
            }
        }
    }
}
