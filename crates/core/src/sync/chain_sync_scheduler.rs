//! Core scheduler constants for blockchain sync jobs.

/// Block count requested by a partial sync.
pub const PARTIAL_SYNC_BLOCKS: u64 = 1000;

/// Block count sent when a full sync is requested; the orchestrator reads it as
/// "scan everything".
pub const FULL_SYNC_BLOCKS: u64 = 999_999;

/// Average block time used to turn a block span into wall-clock time.
pub const AVERAGE_BLOCK_TIME_SECS: u64 = 12;

/// Fixed status poll cadence in milliseconds.
pub const CHAIN_SYNC_POLL_INTERVAL_MS: u64 = 2_000;

/// Delay before the first status poll after a job is accepted.
pub const CHAIN_SYNC_INITIAL_POLL_DELAY_MS: u64 = 1_000;

/// Default cap on status polls (ten minutes at the fixed cadence).
pub const CHAIN_SYNC_POLL_MAX_ATTEMPTS: u32 = 300;

/// Upper bound for a backed-off poll interval.
pub const CHAIN_SYNC_POLL_MAX_INTERVAL_MS: u64 = 30_000;

/// Attempts made to fetch the result payload of a completed job.
pub const CHAIN_SYNC_RESULT_FETCH_ATTEMPTS: u32 = 3;
