//! Error types for the chain sync crate.

use std::time::Duration;

use civic_ledger_core::sync::{classify_http_status, ReconcileError, SyncRetryClass};
use thiserror::Error;

/// Result type alias for chain sync operations.
pub type Result<T> = std::result::Result<T, ChainSyncError>;

/// Errors that can occur while running a sync job.
#[derive(Debug, Error)]
pub enum ChainSyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the job API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Malformed or incomplete response data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No wallet/identity connected; raised before any network call
    #[error("Please connect your wallet to perform blockchain sync.")]
    AuthenticationRequired,

    /// Job creation request failed
    #[error("Failed to start sync job: {0}")]
    Submission(#[source] Box<ChainSyncError>),

    /// A status check failed at the transport level or returned garbage
    #[error("Failed to get job status: {0}")]
    Polling(#[source] Box<ChainSyncError>),

    /// Backend reported `status = failed`
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Poll limits reached before the job finished
    #[error("Job polling timeout after {attempts} attempts ({elapsed:?})")]
    PollingTimeout { attempts: u32, elapsed: Duration },

    /// Job completed but its result payload could not be fetched
    #[error("Failed to get job result: {0}")]
    ResultFetch(#[source] Box<ChainSyncError>),

    /// Result payload did not match any known shape
    #[error(transparent)]
    UnexpectedResultFormat(#[from] ReconcileError),

    /// Another sync is already running
    #[error("A blockchain sync is already in progress (job {job_id})")]
    SyncInProgress { job_id: String },

    /// Local polling stopped before the job finished
    #[error("Sync polling cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChainSyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn submission(err: ChainSyncError) -> Self {
        Self::Submission(Box::new(err))
    }

    pub fn polling(err: ChainSyncError) -> Self {
        Self::Polling(Box::new(err))
    }

    pub fn result_fetch(err: ChainSyncError) -> Self {
        Self::ResultFetch(Box::new(err))
    }

    /// HTTP status if this is (or wraps) an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Submission(inner) | Self::Polling(inner) | Self::ResultFetch(inner) => {
                inner.status_code()
            }
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) => SyncRetryClass::Permanent,
            Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::AuthenticationRequired => SyncRetryClass::ReauthRequired,
            Self::Submission(inner) | Self::Polling(inner) | Self::ResultFetch(inner) => {
                inner.retry_class()
            }
            Self::JobFailed(_) => SyncRetryClass::Permanent,
            Self::PollingTimeout { .. } => SyncRetryClass::Retryable,
            Self::UnexpectedResultFormat(_) => SyncRetryClass::Permanent,
            Self::SyncInProgress { .. } => SyncRetryClass::Retryable,
            Self::Cancelled => SyncRetryClass::Permanent,
            Self::Config(_) => SyncRetryClass::Permanent,
        }
    }
}
