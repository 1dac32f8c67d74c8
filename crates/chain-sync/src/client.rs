//! REST client for the blockchain sync job API.
//!
//! The orchestrator owns the job registry; this client only creates jobs,
//! reads their status and results, and reads entity counts for display.

use async_trait::async_trait;
use futures::future::join_all;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::time::Duration;

use civic_ledger_core::sync::{DbStats, EntityType, SyncJob};

use crate::config::SyncClientConfig;
use crate::error::{ChainSyncError, Result};
use crate::types::*;

const MAX_LOG_BODY_CHARS: usize = 512;

/// Operations the sync pipeline needs from the job backend.
#[async_trait]
pub trait SyncJobApi: Send + Sync {
    async fn create_sync_job(&self, req: &CreateSyncJobRequest) -> Result<CreateSyncJobResponse>;

    async fn get_job_status(&self, job_id: &str) -> Result<SyncJob>;

    async fn get_job_result(&self, job_id: &str) -> Result<JobResultResponse>;

    /// Per-entity record counts. Never fails; unreachable endpoints count as 0.
    async fn fetch_db_stats(&self) -> DbStats;
}

/// Client for the blockchain sync job API.
#[derive(Debug, Clone)]
pub struct ChainSyncClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChainSyncClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the job API (e.g., "http://localhost:8080")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn from_config(config: &SyncClientConfig) -> Result<Self> {
        Self::with_timeout(&config.base_url, config.request_timeout)
    }

    fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Some(message) = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|error| error.describe())
            {
                return Err(ChainSyncError::api(status.as_u16(), message));
            }
            let reason = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body
            };
            return Err(ChainSyncError::api(
                status.as_u16(),
                format!("Request failed: {}", reason),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            ChainSyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Jobs
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a chain-scan job.
    ///
    /// POST /api/blockchain/sync
    pub async fn create_sync_job(
        &self,
        req: &CreateSyncJobRequest,
    ) -> Result<CreateSyncJobResponse> {
        let url = format!("{}/api/blockchain/sync", self.base_url);
        debug!(
            "Creating sync job (blocks_back={}, full={})",
            req.blocks_back, req.is_full_sync
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(req)
            .send()
            .await?;

        let created: CreateSyncJobResponse = Self::parse_response(response).await?;
        if created.job_id.trim().is_empty() {
            return Err(ChainSyncError::invalid_request(
                "No job ID received from server",
            ));
        }
        Ok(created)
    }

    /// Read the current status of a job.
    ///
    /// GET /api/blockchain/sync/status/{jobId}
    pub async fn get_job_status(&self, job_id: &str) -> Result<SyncJob> {
        let url = format!(
            "{}/api/blockchain/sync/status/{}",
            self.base_url,
            urlencoding::encode(job_id)
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;

        let status: JobStatusResponse = Self::parse_response(response).await?;
        Ok(status.job)
    }

    /// Fetch the result payload of a completed job.
    ///
    /// GET /api/blockchain/sync/result/{jobId}
    pub async fn get_job_result(&self, job_id: &str) -> Result<JobResultResponse> {
        let url = format!(
            "{}/api/blockchain/sync/result/{}",
            self.base_url,
            urlencoding::encode(job_id)
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Counts
    // ─────────────────────────────────────────────────────────────────────────

    /// Number of records behind an entity list endpoint.
    ///
    /// GET /api/{entity}
    pub async fn count_entities(&self, entity: EntityType) -> usize {
        let url = format!("{}{}", self.base_url, entity.list_path());

        let response = match self.client.get(&url).headers(self.headers()).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!("Count request for {} failed: {}", entity.api_key(), err);
                return 0;
            }
        };

        match Self::parse_response::<EntityListResponse>(response).await {
            Ok(list) => list.data.as_array().map(Vec::len).unwrap_or(0),
            Err(err) => {
                debug!("Count response for {} unusable: {}", entity.api_key(), err);
                0
            }
        }
    }

    /// Counts for every tracked entity type, fetched concurrently.
    pub async fn fetch_db_stats(&self) -> DbStats {
        let counts = join_all(
            EntityType::ALL
                .iter()
                .map(|entity| async move { (*entity, self.count_entities(*entity).await) }),
        )
        .await;

        let mut stats = DbStats::default();
        for (entity, count) in counts {
            stats.set(entity, count);
        }
        stats
    }
}

#[async_trait]
impl SyncJobApi for ChainSyncClient {
    async fn create_sync_job(&self, req: &CreateSyncJobRequest) -> Result<CreateSyncJobResponse> {
        ChainSyncClient::create_sync_job(self, req).await
    }

    async fn get_job_status(&self, job_id: &str) -> Result<SyncJob> {
        ChainSyncClient::get_job_status(self, job_id).await
    }

    async fn get_job_result(&self, job_id: &str) -> Result<JobResultResponse> {
        ChainSyncClient::get_job_result(self, job_id).await
    }

    async fn fetch_db_stats(&self) -> DbStats {
        ChainSyncClient::fetch_db_stats(self).await
    }
}
