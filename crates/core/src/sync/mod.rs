//! Blockchain sync domain models and services.

mod chain_sync_scheduler;
mod job_model;
mod poll_policy;
pub mod reconcile;
mod result_model;
mod state_store;

pub use chain_sync_scheduler::*;
pub use job_model::*;
pub use poll_policy::*;
pub use reconcile::{
    map_job_result, mark_failed, summarize, LegacyEstimate, MappedSyncReport, ReconcileError,
    ResultConfidence, SyncTotals,
};
pub use result_model::*;
pub use state_store::*;
