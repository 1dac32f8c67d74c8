//! Client side of the asynchronous blockchain sync job pipeline.
//!
//! [`ChainSyncClient`] talks to the job API, [`JobPoller`] drives a job to a
//! terminal state, and [`SyncPipeline`] ties submission, polling, result
//! reconciliation, and local persistence into one state machine.

mod client;
mod config;
mod error;
mod events;
mod identity;
mod pipeline;
mod poller;
mod types;

#[cfg(test)]
mod test_support;

pub use client::{ChainSyncClient, SyncJobApi};
pub use config::SyncClientConfig;
pub use error::{ChainSyncError, Result};
pub use events::{NoopEventSink, SyncEvent, SyncEventSink};
pub use identity::{IdentityProvider, StaticIdentity};
pub use pipeline::{OverlapPolicy, PipelineOptions, PipelineState, SyncPhase, SyncPipeline};
pub use poller::JobPoller;
pub use types::*;

pub use civic_ledger_core::sync::SyncRetryClass;
