//! SQLite persistence for the civic ledger sync pipeline.

pub mod db;
pub mod errors;
pub mod sync;

pub use errors::StorageError;
pub use sync::SqliteKeyValueStore;
