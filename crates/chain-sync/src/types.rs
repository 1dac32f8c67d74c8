//! Wire types for the blockchain sync job API.

use civic_ledger_core::sync::SyncJob;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/blockchain/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSyncJobRequest {
    pub blocks_back: u64,
    pub is_full_sync: bool,
}

/// Response of `POST /api/blockchain/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSyncJobResponse {
    pub job_id: String,
    pub status_url: Option<String>,
    pub result_url: Option<String>,
}

/// Response of `GET /api/blockchain/sync/status/{jobId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job: SyncJob,
}

/// Response of `GET /api/blockchain/sync/result/{jobId}`.
///
/// `result` stays raw JSON; its shape has changed across orchestrator builds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobResultResponse {
    pub result: serde_json::Value,
    pub completed_at: Option<String>,
}

/// Response of `GET /api/{entity}`; only the length of `data` is used.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityListResponse {
    pub data: serde_json::Value,
}

/// Error body returned by the job API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiErrorResponse {
    pub error: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl ApiErrorResponse {
    /// Best human-readable description, if the body carried one.
    pub fn describe(&self) -> Option<String> {
        let message = self
            .message
            .as_deref()
            .or(self.error.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())?;
        Some(match self.code.as_deref().filter(|code| !code.is_empty()) {
            Some(code) => format!("{}: {}", code, message),
            None => message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_ledger_core::sync::JobStatus;

    #[test]
    fn create_request_uses_backend_field_names() {
        let body = serde_json::to_value(CreateSyncJobRequest {
            blocks_back: 999_999,
            is_full_sync: true,
        })
        .expect("serialize request");
        assert_eq!(
            body,
            serde_json::json!({ "blocksBack": 999_999, "isFullSync": true })
        );
    }

    #[test]
    fn status_response_unwraps_job() {
        let parsed: JobStatusResponse = serde_json::from_str(
            r#"{"job":{"status":"running","progress":45,"message":"Scanning petitions"}}"#,
        )
        .expect("parse status");
        assert_eq!(parsed.job.status, JobStatus::Running);
        assert_eq!(parsed.job.progress_percent(), 45);
    }

    #[test]
    fn api_error_prefers_message_with_code() {
        let parsed: ApiErrorResponse =
            serde_json::from_str(r#"{"code":"JOB_NOT_FOUND","message":"No such job"}"#)
                .expect("parse error");
        assert_eq!(parsed.describe().as_deref(), Some("JOB_NOT_FOUND: No such job"));

        let parsed: ApiErrorResponse =
            serde_json::from_str(r#"{"success":false,"error":"rpc down"}"#).expect("parse error");
        assert_eq!(parsed.describe().as_deref(), Some("rpc down"));

        assert!(ApiErrorResponse::default().describe().is_none());
    }
}
