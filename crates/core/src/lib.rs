//! Domain model, reconciliation, and persistence contracts for the
//! blockchain synchronization job pipeline.

pub mod errors;
pub mod sync;

pub use errors::{Error, Result};
