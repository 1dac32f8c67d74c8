//! Backend-owned sync job as reported by the status endpoint.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a backend sync job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }
}

/// Snapshot of a job returned by `GET /api/blockchain/sync/status/{jobId}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncJob {
    pub status: JobStatus,
    pub progress: Option<i64>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl SyncJob {
    /// Reported progress clamped into `0..=100`; missing progress reads as 0.
    pub fn progress_percent(&self) -> u8 {
        self.progress.unwrap_or(0).clamp(0, 100) as u8
    }

    /// Human-readable step, falling back to `Job <status>...`.
    pub fn display_message(&self) -> String {
        match self.message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!("Job {}...", self.status.as_str()),
        }
    }

    /// Backend failure reason, `Unknown error` when the backend gave none.
    pub fn failure_reason(&self) -> String {
        self.error
            .as_deref()
            .filter(|error| !error.trim().is_empty())
            .unwrap_or("Unknown error")
            .to_string()
    }
}
