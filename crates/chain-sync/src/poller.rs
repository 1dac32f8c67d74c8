//! Status polling loop for a submitted sync job.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;

use civic_ledger_core::sync::{JobStatus, PollPolicy, SyncJob};

use crate::client::SyncJobApi;
use crate::error::{ChainSyncError, Result};

/// Drives one job to a terminal state.
///
/// Polls are strictly sequential: the next request is only scheduled after
/// the previous one resolved. Transport failures are not retried.
pub struct JobPoller<'a> {
    api: &'a dyn SyncJobApi,
    policy: &'a PollPolicy,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl<'a> JobPoller<'a> {
    pub fn new(api: &'a dyn SyncJobApi, policy: &'a PollPolicy) -> Self {
        Self {
            api,
            policy,
            cancel_flag: None,
        }
    }

    /// Stop polling (with [`ChainSyncError::Cancelled`]) once the flag is raised.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Polls until the job completes, calling `on_update` with every status
    /// read. Returns the completed job.
    pub async fn wait_for_completion<F>(&self, job_id: &str, mut on_update: F) -> Result<SyncJob>
    where
        F: FnMut(&SyncJob),
    {
        let started_at = Instant::now();
        let mut attempts = 0u32;

        if !self.policy.initial_delay.is_zero() {
            sleep(self.policy.initial_delay).await;
        }

        loop {
            if self.is_cancelled() {
                info!("Stopped polling job {} after {} attempts", job_id, attempts);
                return Err(ChainSyncError::Cancelled);
            }
            let elapsed = started_at.elapsed();
            if self.policy.attempts_exhausted(attempts) || self.policy.duration_exhausted(elapsed) {
                return Err(ChainSyncError::PollingTimeout { attempts, elapsed });
            }

            attempts += 1;
            let job = self
                .api
                .get_job_status(job_id)
                .await
                .map_err(ChainSyncError::polling)?;
            debug!(
                "Job {}: {} ({}%) - {} [attempt {}]",
                job_id,
                job.status.as_str(),
                job.progress_percent(),
                job.display_message(),
                attempts
            );
            on_update(&job);

            match job.status {
                JobStatus::Completed => return Ok(job),
                JobStatus::Failed => return Err(ChainSyncError::JobFailed(job.failure_reason())),
                JobStatus::Pending | JobStatus::Running => {}
                JobStatus::Unknown => {
                    return Err(ChainSyncError::polling(ChainSyncError::invalid_request(
                        "Unknown job status",
                    )));
                }
            }

            sleep(self.policy.delay_after_attempt(attempts)).await;
        }
    }
}
