//! SQLite storage for the sync pipeline's persisted state.

mod kv_store;

pub use kv_store::SqliteKeyValueStore;
